use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, Result};
use crate::retry::RetryPolicy;
use crate::store::AccountId;
use crate::sweep::ResetFailurePolicy;
use crate::TransactionIsolation;

/// One isolation/retry combination to sweep.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub isolation: TransactionIsolation,
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Configuration of a full benchmark: the account universe, the concurrency
/// levels, and the scenarios to run over them.
///
/// Missing fields fall back to the classic setup: accounts `1..=100`,
/// `k ∈ {2, 10, 50, 100}`, and the three scenarios SERIALIZABLE with retry,
/// SERIALIZABLE without retry and READ COMMITTED without retry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    /// Destination accounts are `1..=accounts`.
    pub accounts: u32,
    pub k_values: Vec<usize>,
    pub scenarios: Vec<ScenarioConfig>,
    /// Per-k join timeout; `None` waits indefinitely.
    #[serde(with = "optional_millis", rename = "join_timeout_ms")]
    pub join_timeout: Option<Duration>,
    /// How long a timed-out run keeps waiting for its workers before the
    /// whole benchmark stops.
    #[serde(with = "crate::retry::millis", rename = "drain_grace_ms")]
    pub drain_grace: Duration,
    pub reset_failure: ResetFailurePolicy,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            accounts: 100,
            k_values: vec![2, 10, 50, 100],
            scenarios: vec![
                ScenarioConfig {
                    isolation: TransactionIsolation::Serializable,
                    retry: RetryPolicy::default(),
                },
                ScenarioConfig {
                    isolation: TransactionIsolation::Serializable,
                    retry: RetryPolicy::disabled(),
                },
                ScenarioConfig {
                    isolation: TransactionIsolation::ReadCommitted,
                    retry: RetryPolicy::disabled(),
                },
            ],
            join_timeout: Some(Duration::from_secs(60)),
            drain_grace: Duration::from_secs(30),
            reset_failure: ResetFailurePolicy::Abort,
        }
    }
}

impl BenchConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.accounts == 0 {
            return Err(BenchError::Config("accounts must be at least 1".to_string()));
        }
        if self.k_values.is_empty() {
            return Err(BenchError::Config("k_values must not be empty".to_string()));
        }
        if let Some(&k) = self.k_values.iter().find(|&&k| k == 0) {
            return Err(BenchError::InvalidChunkSize(k));
        }
        if self.scenarios.is_empty() {
            return Err(BenchError::Config("at least one scenario is required".to_string()));
        }
        for scenario in &self.scenarios {
            scenario.retry.validate()?;
        }
        Ok(())
    }

    /// The destination accounts, in order.
    pub fn universe(&self) -> Vec<AccountId> {
        (1..=AccountId::from(self.accounts)).collect()
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
