use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use log::{debug, warn};

use crate::errors::{BenchError, Result, StoreError};
use crate::partition::Chunk;
use crate::retry::{RetryController, RetryPolicy, TransactionOutcome, WorkerReport};
use crate::TransactionIsolation;

/// Per-run counts of worker outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    pub committed: usize,
    pub retries_exhausted: usize,
    pub failed: usize,
    /// Executor invocations summed over all workers.
    pub attempts: u64,
}

impl OutcomeTally {
    pub fn from_reports(reports: &[WorkerReport]) -> Self {
        reports.iter().fold(Self::default(), |mut tally, report| {
            match report.outcome {
                TransactionOutcome::Committed => tally.committed += 1,
                TransactionOutcome::RetriesExhausted(_) => tally.retries_exhausted += 1,
                TransactionOutcome::FailedNonRetryable(_) => tally.failed += 1,
            }
            tally.attempts += u64::from(report.attempts);
            tally
        })
    }
}

/// Everything one concurrent run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Wall clock from before the first spawn until the last worker finished.
    /// `None` when the run exceeded the join timeout.
    pub elapsed: Option<Duration>,
    /// One report per chunk, ordered by chunk index.
    pub reports: Vec<WorkerReport>,
    pub timed_out: bool,
}

impl RunReport {
    pub fn tally(&self) -> OutcomeTally {
        OutcomeTally::from_reports(&self.reports)
    }
}

/// Launches one worker thread per chunk and waits for all of them.
///
/// Workers share nothing in-process; each drives its own
/// [`RetryController::run`] and reports back over a channel. Coordination
/// between workers is left entirely to the store.
#[derive(Clone)]
pub struct ConcurrentRunner {
    controller: RetryController,
    join_timeout: Option<Duration>,
    drain_grace: Duration,
}

impl ConcurrentRunner {
    /// A runner that waits for its workers without a deadline.
    pub fn new(controller: RetryController) -> Self {
        Self {
            controller,
            join_timeout: None,
            drain_grace: Duration::from_secs(30),
        }
    }

    /// Marks a run as timed out when its workers have not all finished after `timeout`.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = Some(timeout);
        self
    }

    /// How long a timed-out run still waits for stragglers before the run fails hard.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Runs every chunk concurrently and returns once each worker reached a terminal outcome.
    ///
    /// A run that misses the join timeout is reported with `timed_out` set
    /// and no elapsed time. Stragglers are then given `drain_grace` to
    /// finish, so they never overlap whatever the caller does next.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Timeout`] when stragglers outlive the drain grace.
    /// Those workers are still running, so the store is not safe to reuse.
    /// Returns [`BenchError::Io`] when a worker thread cannot be spawned,
    /// after the workers spawned before it have finished.
    pub fn run_all(
        &self,
        chunks: Vec<Chunk>,
        isolation: TransactionIsolation,
        policy: &RetryPolicy,
    ) -> Result<RunReport> {
        self.run_with_spawner(chunks, isolation, policy, |name, work| {
            thread::Builder::new().name(name).spawn(work)
        })
    }

    fn run_with_spawner<S>(
        &self,
        chunks: Vec<Chunk>,
        isolation: TransactionIsolation,
        policy: &RetryPolicy,
        mut spawn: S,
    ) -> Result<RunReport>
    where
        S: FnMut(String, Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>>,
    {
        let total = chunks.len();
        let (sender, receiver) = unbounded::<WorkerReport>();
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(total);

        let start = Instant::now();
        for chunk in chunks {
            let worker_sender = sender.clone();
            let controller = self.controller.clone();
            let policy = *policy;
            let name = format!("isobench-worker-{}", chunk.index());
            let work: Box<dyn FnOnce() + Send> = Box::new(move || {
                let report = panic::catch_unwind(AssertUnwindSafe(|| {
                    controller.run(&chunk, isolation, &policy)
                }))
                .unwrap_or_else(|payload| WorkerReport {
                    chunk_index: chunk.index(),
                    accounts: chunk.accounts().to_vec(),
                    attempts: 0,
                    outcome: TransactionOutcome::FailedNonRetryable(StoreError::Other(format!(
                        "worker panicked: {}",
                        panic_message(payload.as_ref())
                    ))),
                });
                // The runner may already have stopped listening.
                let _ = worker_sender.send(report);
            });
            match spawn(name, work) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    // Workers already running must not outlive this run.
                    warn!(
                        "Could not spawn worker {} of {}: {}; waiting for {} running worker(s)",
                        handles.len() + 1,
                        total,
                        err,
                        handles.len()
                    );
                    drop(sender);
                    join_all(handles);
                    return Err(err.into());
                }
            }
        }
        drop(sender);

        let mut reports = Vec::with_capacity(total);
        let deadline = self.join_timeout.map(|timeout| start + timeout);
        if collect_until(&receiver, &mut reports, total, deadline) {
            let elapsed = start.elapsed();
            join_all(handles);
            reports.sort_by_key(|report| report.chunk_index);
            debug!("{} workers finished in {:?}", total, elapsed);
            return Ok(RunReport {
                elapsed: Some(elapsed),
                reports,
                timed_out: false,
            });
        }

        warn!(
            "{} of {} workers still running after {:?}; waiting up to {:?} for stragglers",
            total - reports.len(),
            total,
            start.elapsed(),
            self.drain_grace
        );
        let drain_deadline = Instant::now() + self.drain_grace;
        if collect_until(&receiver, &mut reports, total, Some(drain_deadline)) {
            join_all(handles);
            reports.sort_by_key(|report| report.chunk_index);
            return Ok(RunReport {
                elapsed: None,
                reports,
                timed_out: true,
            });
        }

        Err(BenchError::Timeout {
            pending: total - reports.len(),
            total,
            waited: start.elapsed(),
        })
    }
}

/// Receives reports until `total` arrived. Returns `false` if the deadline passed first.
fn collect_until(
    receiver: &Receiver<WorkerReport>,
    reports: &mut Vec<WorkerReport>,
    total: usize,
    deadline: Option<Instant>,
) -> bool {
    while reports.len() < total {
        let next = match deadline {
            Some(deadline) => receiver.recv_deadline(deadline).ok(),
            None => receiver.recv().ok(),
        };
        match next {
            Some(report) => reports.push(report),
            None => return false,
        }
    }
    true
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            warn!("Worker thread panicked after reporting");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
