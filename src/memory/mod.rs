//! An in-memory, multi-version implementation of [`AccountStore`].
//!
//! `MemoryStore` gives the benchmark a store with real isolation behaviour
//! and no database: `RepeatableRead` and `Serializable` abort the later of
//! two transactions that touch the same account, while `ReadCommitted`
//! lets their read-modify-write cycles interleave and lose updates.

pub mod account_buffer;
pub mod detection;
pub mod transaction;
pub mod versioned_value;

use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use account_buffer::AccountBuffer;
pub use detection::{detect_conflicts, ConflictType};
pub use transaction::MemoryTransaction;
pub use versioned_value::VersionedBalance;

use crate::errors::{StoreError, StoreResult};
use crate::store::{baseline_balance, AccountId, AccountStore, BalanceMutation, SOURCE_ACCOUNT};
use crate::TransactionIsolation;

pub struct MemoryStore {
    /// Committed balances.
    buffer: Arc<AccountBuffer>,
    /// Hands out transaction start timestamps and commit versions.
    transaction_counter: Arc<AtomicU64>,
    /// Serializes commit validation with publication, and resets with commits.
    commit_lock: Arc<Mutex<()>>,
    statement_latency: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store. Call [`AccountStore::reset_to_baseline`] before use.
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(AccountBuffer::new()),
            transaction_counter: Arc::new(AtomicU64::new(1)),
            commit_lock: Arc::new(Mutex::new(())),
            statement_latency: Duration::ZERO,
        }
    }

    /// Makes every statement sleep for `latency` between its read and its write.
    ///
    /// Widens the window in which concurrent transactions overlap, standing
    /// in for the round trip a networked database would add.
    pub fn with_statement_latency(mut self, latency: Duration) -> Self {
        self.statement_latency = latency;
        self
    }

    /// Starts a new transaction at `isolation`.
    pub fn begin(&self, isolation: TransactionIsolation) -> MemoryTransaction {
        let transaction_id = self.transaction_counter.fetch_add(1, Ordering::SeqCst);
        MemoryTransaction::new(
            transaction_id,
            isolation,
            Arc::clone(&self.buffer),
            Arc::clone(&self.transaction_counter),
            Arc::clone(&self.commit_lock),
            self.statement_latency,
        )
    }

    /// Overwrites `account` outside of any transaction, creating it if needed.
    ///
    /// The write gets a fresh version, so transactions already running
    /// under validating isolation levels will conflict on it.
    pub fn set_balance(&self, account: AccountId, balance: i64) {
        let _guard = self.commit_lock.lock();
        let version = self.transaction_counter.fetch_add(1, Ordering::SeqCst);
        self.buffer
            .insert(account, VersionedBalance::new(balance, version));
    }

    /// All committed `(account, balance)` pairs in account order.
    pub fn balances(&self) -> Vec<(AccountId, i64)> {
        self.buffer.balances()
    }
}

impl AccountStore for MemoryStore {
    fn reset_to_baseline(&self, universe: &[AccountId]) -> StoreResult<()> {
        let _guard = self.commit_lock.lock();
        let version = self.transaction_counter.fetch_add(1, Ordering::SeqCst);
        self.buffer.clear();
        self.buffer.insert(
            SOURCE_ACCOUNT,
            VersionedBalance::new(baseline_balance(universe), version),
        );
        for &account in universe {
            self.buffer.insert(account, VersionedBalance::new(0, version));
        }
        debug!(
            "Reset {} accounts to baseline at version {}",
            universe.len() + 1,
            version
        );
        Ok(())
    }

    fn read_balance(&self, account: AccountId) -> StoreResult<i64> {
        self.buffer
            .get(account)
            .map(|value| value.balance())
            .ok_or_else(|| StoreError::Other(format!("account {} does not exist", account)))
    }

    fn execute(
        &self,
        isolation: TransactionIsolation,
        mutations: &[BalanceMutation],
    ) -> StoreResult<()> {
        let mut txn = self.begin(isolation);
        for &mutation in mutations {
            if let Err(err) = txn.apply(mutation) {
                txn.rollback();
                return Err(err);
            }
        }
        txn.commit().map(|_| ())
    }
}
