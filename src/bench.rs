use std::sync::Arc;

use log::{error, info, warn};

use crate::config::{BenchConfig, ScenarioConfig};
use crate::errors::{BenchError, Result};
use crate::report::ResultReporter;
use crate::store::AccountStore;
use crate::sweep::{BenchmarkSweep, SweepSeries};

/// Isobench Prelude
pub mod prelude {
    pub use crate::bench::*;
    pub use crate::config::*;
    pub use crate::errors::*;
    pub use crate::executor::*;
    pub use crate::memory::*;
    pub use crate::partition::*;
    pub use crate::report::*;
    pub use crate::retry::*;
    pub use crate::runner::*;
    pub use crate::store::*;
    pub use crate::sweep::*;
    pub use crate::*;
}

/// Outcome of one configured scenario.
#[derive(Debug)]
pub struct ScenarioResult {
    pub scenario: ScenarioConfig,
    /// The finished series, or the error that aborted this scenario's sweep.
    pub series: Result<SweepSeries>,
}

/// The main entry point: runs every configured scenario against one store.
pub struct Isobench {
    store: Arc<dyn AccountStore>,
    config: BenchConfig,
}

impl Isobench {
    /// Creates a benchmark after validating `config`.
    pub fn new(store: Arc<dyn AccountStore>, config: BenchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    fn sweep(&self) -> BenchmarkSweep {
        let sweep = BenchmarkSweep::new(Arc::clone(&self.store))
            .with_reset_failure(self.config.reset_failure)
            .with_drain_grace(self.config.drain_grace);
        match self.config.join_timeout {
            Some(timeout) => sweep.with_join_timeout(timeout),
            None => sweep,
        }
    }

    /// Runs the scenarios one after another and hands each finished series to `reporter`.
    ///
    /// A scenario whose sweep fails is recorded with its error; the remaining
    /// scenarios still run. Reporter failures are logged and do not stop the run.
    ///
    /// The exception is [`BenchError::Timeout`]: its workers are still running
    /// against the store, so every later scenario is recorded as
    /// [`BenchError::Abandoned`] instead of resetting a store in use.
    pub fn run(&self, reporter: &mut dyn ResultReporter) -> Vec<ScenarioResult> {
        let universe = self.config.universe();
        let sweep = self.sweep();
        let mut store_in_use: Option<String> = None;
        let mut results = Vec::with_capacity(self.config.scenarios.len());

        for scenario in &self.config.scenarios {
            if let Some(cause) = &store_in_use {
                warn!(
                    "Skipping {} (retry enabled: {}): {}",
                    scenario.isolation, scenario.retry.enabled, cause
                );
                results.push(ScenarioResult {
                    scenario: scenario.clone(),
                    series: Err(BenchError::Abandoned(cause.clone())),
                });
                continue;
            }

            info!(
                "=== Running test for isolation level {} | retry enabled: {} ===",
                scenario.isolation, scenario.retry.enabled
            );
            let series = sweep.sweep(
                &universe,
                &self.config.k_values,
                scenario.isolation,
                &scenario.retry,
            );
            match &series {
                Ok(series) => {
                    if let Err(err) = reporter.report(series) {
                        error!("Reporter failed for {}: {}", series.label(), err);
                    }
                }
                Err(err) => {
                    error!(
                        "Sweep for {} (retry enabled: {}) aborted: {}",
                        scenario.isolation, scenario.retry.enabled, err
                    );
                    if matches!(err, BenchError::Timeout { .. }) {
                        store_in_use = Some(format!(
                            "workers of the {} sweep are still running against the store",
                            scenario.isolation
                        ));
                    }
                }
            }
            results.push(ScenarioResult {
                scenario: scenario.clone(),
                series,
            });
        }

        results
    }
}
