use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::BenchError;

/// Defines the isolation levels a benchmark run can request from the store.
///
/// The level is handed to the store verbatim for every transaction. Rendering
/// to SQL goes through [`TransactionIsolation::as_sql`] only, so a store never
/// receives a level outside this fixed allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionIsolation {
    /// **Read Committed:**
    ///
    /// Every statement sees data committed before the statement began. Two
    /// workers may both read the same source balance and both write back a
    /// decrement of it, so one decrement is lost. This is the anomaly the
    /// benchmark exists to surface.
    ReadCommitted,
    /// **Repeatable Read:**
    ///
    /// All reads inside the transaction see one snapshot. A transaction that
    /// tries to update a row another transaction changed after the snapshot
    /// aborts with a serialization conflict.
    RepeatableRead,
    /// **Serializable:**
    ///
    /// Transactions produce the same result as some serial order. Concurrent
    /// updates of the source account make all but one worker abort with a
    /// serialization conflict, which the retry controller may retry.
    Serializable,
}

impl TransactionIsolation {
    /// All levels, weakest first.
    pub const ALL: [TransactionIsolation; 3] = [
        TransactionIsolation::ReadCommitted,
        TransactionIsolation::RepeatableRead,
        TransactionIsolation::Serializable,
    ];

    /// SQL spelling used in `SET TRANSACTION ISOLATION LEVEL ...`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            TransactionIsolation::ReadCommitted => "READ COMMITTED",
            TransactionIsolation::RepeatableRead => "REPEATABLE READ",
            TransactionIsolation::Serializable => "SERIALIZABLE",
        }
    }

    /// Whether commits at this level validate what the transaction read.
    pub fn validates_reads(&self) -> bool {
        !matches!(self, TransactionIsolation::ReadCommitted)
    }
}

impl fmt::Display for TransactionIsolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for TransactionIsolation {
    type Err = BenchError;

    /// Accepts `READ COMMITTED`, `read_committed`, `Serializable` and so on.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(['_', '-'], " ").to_ascii_uppercase();
        TransactionIsolation::ALL
            .into_iter()
            .find(|level| level.as_sql() == normalized)
            .ok_or_else(|| BenchError::Config(format!("unknown isolation level '{}'", s)))
    }
}
