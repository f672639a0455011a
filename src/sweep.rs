use std::sync::Arc;
use std::time::Duration;

use ahash::AHashSet;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, Result};
use crate::executor::TransactionExecutor;
use crate::partition::partition;
use crate::retry::{RetryController, RetryPolicy};
use crate::runner::{ConcurrentRunner, OutcomeTally};
use crate::store::{baseline_balance, AccountId, AccountStore, SOURCE_ACCOUNT};
use crate::TransactionIsolation;

/// What a sweep does when the store cannot be reset before a k.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetFailurePolicy {
    /// Fail the whole sweep.
    #[default]
    Abort,
    /// Record the k with every metric unavailable and move on to the next k.
    SkipK,
}

/// Measurements for one concurrency level. `None` marks a metric as unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub k: usize,
    /// Number of workers the universe was split into.
    pub chunks: usize,
    pub elapsed: Option<Duration>,
    /// Chunks per second.
    pub throughput: Option<f64>,
    /// Fraction of the expected source decrements that actually landed.
    pub correctness: Option<f64>,
    pub final_balance: Option<i64>,
    pub tally: OutcomeTally,
}

impl RunResult {
    fn unavailable(k: usize, chunks: usize) -> Self {
        Self {
            k,
            chunks,
            elapsed: None,
            throughput: None,
            correctness: None,
            final_balance: None,
            tally: OutcomeTally::default(),
        }
    }

    /// True when every metric of this k could be measured.
    pub fn is_complete(&self) -> bool {
        self.elapsed.is_some() && self.throughput.is_some() && self.correctness.is_some()
    }
}

/// Results of one sweep, one entry per k in sweep order.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSeries {
    isolation: TransactionIsolation,
    policy: RetryPolicy,
    results: Vec<RunResult>,
}

impl SweepSeries {
    pub fn new(isolation: TransactionIsolation, policy: RetryPolicy) -> Self {
        Self {
            isolation,
            policy,
            results: Vec::new(),
        }
    }

    pub fn isolation(&self) -> TransactionIsolation {
        self.isolation
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Human-readable name of the configuration, e.g. `SERIALIZABLE with retry`.
    pub fn label(&self) -> String {
        if self.policy.enabled {
            format!("{} with retry", self.isolation)
        } else {
            format!("{} without retry", self.isolation)
        }
    }

    fn push(&mut self, result: RunResult) {
        self.results.push(result);
    }
}

/// Rejects universes the transfer workload cannot run over.
fn validate_universe(universe: &[AccountId]) -> Result<()> {
    if universe.contains(&SOURCE_ACCOUNT) {
        return Err(BenchError::Config(format!(
            "universe must not contain the source account {}",
            SOURCE_ACCOUNT
        )));
    }
    let mut seen = AHashSet::with_capacity(universe.len());
    if let Some(account) = universe.iter().find(|&&account| !seen.insert(account)) {
        return Err(BenchError::Config(format!(
            "account {} appears more than once in the universe",
            account
        )));
    }
    Ok(())
}

/// `(baseline - final_balance) / baseline`, or `None` for an empty baseline.
pub fn correctness(baseline: i64, final_balance: i64) -> Option<f64> {
    if baseline == 0 {
        return None;
    }
    Some((baseline - final_balance) as f64 / baseline as f64)
}

fn throughput(chunks: usize, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (secs > 0.0).then(|| chunks as f64 / secs)
}

/// The outer loop over concurrency levels for one isolation/retry configuration.
///
/// Every k runs the full reset → partition → run → read cycle before the
/// next k starts, because all of them share the store's single account table.
pub struct BenchmarkSweep {
    store: Arc<dyn AccountStore>,
    runner: ConcurrentRunner,
    reset_failure: ResetFailurePolicy,
}

impl BenchmarkSweep {
    /// Creates a sweep whose workers run against `store` without a join timeout.
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        let controller = RetryController::new(TransactionExecutor::new(Arc::clone(&store)));
        Self {
            store,
            runner: ConcurrentRunner::new(controller),
            reset_failure: ResetFailurePolicy::default(),
        }
    }

    pub fn with_runner(mut self, runner: ConcurrentRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.runner = self.runner.with_join_timeout(timeout);
        self
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.runner = self.runner.with_drain_grace(grace);
        self
    }

    pub fn with_reset_failure(mut self, policy: ResetFailurePolicy) -> Self {
        self.reset_failure = policy;
        self
    }

    /// Runs the transfer workload once per k in `k_values`, in order.
    ///
    /// A failed final-balance read or a timed-out run still adds a
    /// [`RunResult`] for its k, with the affected metrics set to `None`.
    ///
    /// The source starts each k with one unit per account of `universe`, so
    /// correctness is `(len - final_balance) / len`; the classic universe
    /// `1..=100` gives the familiar `(100 - B) / 100`.
    ///
    /// # Errors
    ///
    /// - [`BenchError::InvalidChunkSize`] if any k is zero; checked before the store is touched.
    /// - [`BenchError::Config`] if `universe` contains [`SOURCE_ACCOUNT`] or
    ///   repeats an account; also checked up front.
    /// - [`BenchError::Reset`] if the store cannot be reset and the policy is
    ///   [`ResetFailurePolicy::Abort`].
    /// - [`BenchError::Timeout`] if workers of a timed-out run never finish.
    pub fn sweep(
        &self,
        universe: &[AccountId],
        k_values: &[usize],
        isolation: TransactionIsolation,
        policy: &RetryPolicy,
    ) -> Result<SweepSeries> {
        if let Some(&k) = k_values.iter().find(|&&k| k == 0) {
            return Err(BenchError::InvalidChunkSize(k));
        }
        validate_universe(universe)?;

        let mut series = SweepSeries::new(isolation, *policy);
        info!("Running sweep: {}", series.label());

        for &k in k_values {
            if let Err(reason) = self.reset_and_verify(universe) {
                match self.reset_failure {
                    ResetFailurePolicy::Abort => return Err(BenchError::Reset { k, reason }),
                    ResetFailurePolicy::SkipK => {
                        warn!("Could not reset store before k={}, skipping: {}", k, reason);
                        series.push(RunResult::unavailable(k, universe.len().div_ceil(k)));
                        continue;
                    }
                }
            }

            let result = self.run_k(universe, k, isolation, policy)?;
            info!(
                "k={}: {}/{} chunks committed, correctness={}",
                k,
                result.tally.committed,
                result.chunks,
                result
                    .correctness
                    .map_or_else(|| "N/A".to_string(), |c| format!("{:.4}", c))
            );
            series.push(result);
        }

        Ok(series)
    }

    /// Resets the store and reads the source balance back to confirm the baseline.
    fn reset_and_verify(&self, universe: &[AccountId]) -> std::result::Result<(), String> {
        self.store
            .reset_to_baseline(universe)
            .map_err(|err| err.to_string())?;
        let expected = baseline_balance(universe);
        match self.store.read_balance(SOURCE_ACCOUNT) {
            Ok(balance) if balance == expected => Ok(()),
            Ok(balance) => Err(format!(
                "source balance is {} after reset, expected {}",
                balance, expected
            )),
            Err(err) => Err(format!("could not verify baseline: {}", err)),
        }
    }

    fn run_k(
        &self,
        universe: &[AccountId],
        k: usize,
        isolation: TransactionIsolation,
        policy: &RetryPolicy,
    ) -> Result<RunResult> {
        let chunks = partition(universe, k)?;
        let chunk_count = chunks.len();
        let report = self.runner.run_all(chunks, isolation, policy)?;
        let tally = report.tally();

        let Some(elapsed) = report.elapsed else {
            warn!("Run for k={} timed out; its metrics are unavailable", k);
            return Ok(RunResult {
                tally,
                ..RunResult::unavailable(k, chunk_count)
            });
        };

        let final_balance = match self.store.read_balance(SOURCE_ACCOUNT) {
            Ok(balance) => Some(balance),
            Err(err) => {
                warn!("Error fetching final balance for k={}: {}", k, err);
                None
            }
        };

        Ok(RunResult {
            k,
            chunks: chunk_count,
            elapsed: Some(elapsed),
            throughput: throughput(chunk_count, elapsed),
            correctness: final_balance
                .and_then(|balance| correctness(baseline_balance(universe), balance)),
            final_balance,
            tally,
        })
    }
}
