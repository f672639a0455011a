pub mod bench;
pub mod config;
pub mod errors;
pub mod executor;
pub mod isolation;
pub mod memory;
pub mod partition;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod report;
pub mod retry;
pub mod runner;
pub mod store;
pub mod sweep;

// Re-export key types and structs for easier access
pub use bench::{prelude, Isobench, ScenarioResult};
pub use config::{BenchConfig, ScenarioConfig};
pub use errors::{BenchError, Result, StoreError, StoreResult};
pub use executor::TransactionExecutor;
pub use isolation::TransactionIsolation;
pub use memory::MemoryStore;
pub use partition::{partition, Chunk};
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use report::{JsonLinesReporter, LogReporter, ResultReporter, SeriesReport};
pub use retry::{RetryController, RetryPolicy, TransactionOutcome, WorkerReport};
pub use runner::{ConcurrentRunner, OutcomeTally, RunReport};
pub use store::{AccountId, AccountStore, BalanceMutation, SOURCE_ACCOUNT};
pub use sweep::{BenchmarkSweep, ResetFailurePolicy, RunResult, SweepSeries};
