use std::thread;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, Result, StoreError};
use crate::executor::TransactionExecutor;
use crate::partition::Chunk;
use crate::store::AccountId;
use crate::TransactionIsolation;

/// How a worker reacts to serialization conflicts.
///
/// When `enabled` is false the policy behaves as if `max_attempts` were 1,
/// whatever its configured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    #[serde(rename = "backoff_base_ms", with = "millis")]
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            backoff_base: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Creates a retrying policy.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] when `max_attempts` is zero.
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Result<Self> {
        let policy = Self {
            enabled: true,
            max_attempts,
            backoff_base,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(BenchError::Config(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Upper bound on executor invocations per chunk.
    pub fn effective_max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Sleep before the attempt following `attempt`: linear in the attempt number.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }
}

/// Terminal result of one worker's transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    Committed,
    /// The store reported something other than a conflict. Never retried.
    FailedNonRetryable(StoreError),
    /// Every allowed attempt ended in a conflict; carries the last one.
    RetriesExhausted(StoreError),
}

impl TransactionOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionOutcome::Committed)
    }
}

/// What a worker hands back to the runner once it reaches a terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub chunk_index: usize,
    pub accounts: Vec<AccountId>,
    /// Executor invocations made, including the successful one.
    pub attempts: u32,
    pub outcome: TransactionOutcome,
}

/// Bounded retry loop around a [`TransactionExecutor`].
///
/// This is the only retry logic in the crate; stores must not retry on their own.
#[derive(Clone)]
pub struct RetryController {
    executor: TransactionExecutor,
}

impl RetryController {
    pub fn new(executor: TransactionExecutor) -> Self {
        Self { executor }
    }

    /// Drives `chunk` to a terminal outcome under `policy`.
    ///
    /// Attempts start at 1. A conflict on attempt `n` sleeps
    /// `backoff_base * n` and tries again, unless retries are disabled or `n`
    /// already equals the attempt bound, in which case the outcome is
    /// [`TransactionOutcome::RetriesExhausted`]. Other failures return at once.
    pub fn run(
        &self,
        chunk: &Chunk,
        isolation: TransactionIsolation,
        policy: &RetryPolicy,
    ) -> WorkerReport {
        let max_attempts = policy.effective_max_attempts();
        let mut attempt = 1;

        let outcome = loop {
            match self.executor.execute(chunk, isolation) {
                Ok(()) => break TransactionOutcome::Committed,
                Err(err) if err.is_conflict() => {
                    if attempt >= max_attempts {
                        warn!(
                            "Chunk {} gave up after {} attempt(s): {}",
                            chunk.index(),
                            attempt,
                            err
                        );
                        break TransactionOutcome::RetriesExhausted(err);
                    }
                    let backoff = policy.backoff_for(attempt);
                    debug!(
                        "Chunk {} conflict on attempt {} of {}: {} (backoff={:?})",
                        chunk.index(),
                        attempt,
                        max_attempts,
                        err,
                        backoff
                    );
                    thread::sleep(backoff);
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        "Error in transaction for accounts {:?}: {}",
                        chunk.accounts(),
                        err
                    );
                    break TransactionOutcome::FailedNonRetryable(err);
                }
            }
        };

        WorkerReport {
            chunk_index: chunk.index(),
            accounts: chunk.accounts().to_vec(),
            attempts: attempt,
            outcome,
        }
    }
}

/// Serializes a `Duration` as whole milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
