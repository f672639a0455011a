use ahash::AHashMap as HashMap;
use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::errors::{StoreError, StoreResult};
use crate::memory::account_buffer::AccountBuffer;
use crate::memory::detection::detect_conflicts;
use crate::memory::versioned_value::VersionedBalance;
use crate::store::{AccountId, BalanceMutation};
use crate::TransactionIsolation;

/// Represents a single transaction against a [`MemoryStore`](crate::memory::MemoryStore).
///
/// Writes are staged in a private write set and only become visible on
/// [`MemoryTransaction::commit`]. Under `RepeatableRead` and `Serializable`
/// the transaction's id doubles as its snapshot timestamp: reading an
/// account committed after the transaction began is an immediate conflict,
/// and the read set is validated again at commit.
pub struct MemoryTransaction {
    /// Unique identifier for the transaction (start timestamp).
    id: u64,
    isolation_level: TransactionIsolation,
    buffer: Arc<AccountBuffer>,
    transaction_counter: Arc<AtomicU64>,
    commit_lock: Arc<Mutex<()>>,
    /// Simulated round trip paid by every statement.
    statement_latency: Duration,
    /// Accounts read by this transaction and the versions they were read at.
    read_set: HashMap<AccountId, u64>,
    /// Staged balances.
    write_set: HashMap<AccountId, i64>,
}

impl MemoryTransaction {
    pub(crate) fn new(
        id: u64,
        isolation_level: TransactionIsolation,
        buffer: Arc<AccountBuffer>,
        transaction_counter: Arc<AtomicU64>,
        commit_lock: Arc<Mutex<()>>,
        statement_latency: Duration,
    ) -> Self {
        Self {
            id,
            isolation_level,
            buffer,
            transaction_counter,
            commit_lock,
            statement_latency,
            read_set: HashMap::new(),
            write_set: HashMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn isolation_level(&self) -> TransactionIsolation {
        self.isolation_level
    }

    /// Reads the balance of `account` as this transaction sees it.
    ///
    /// Staged writes win over committed state.
    ///
    /// # Errors
    ///
    /// - `StoreError::Conflict` if the isolation level validates reads and
    ///   the account was committed after this transaction began.
    /// - `StoreError::Other` if the account does not exist.
    pub fn read(&mut self, account: AccountId) -> StoreResult<i64> {
        if let Some(&balance) = self.write_set.get(&account) {
            return Ok(balance);
        }

        let value = self
            .buffer
            .get(account)
            .ok_or_else(|| StoreError::Other(format!("account {} does not exist", account)))?;

        if self.isolation_level.validates_reads() {
            if value.version() > self.id {
                debug!(
                    "Transaction {} read account {} at version {} newer than its snapshot",
                    self.id,
                    account,
                    value.version()
                );
                return Err(serialization_failure(account));
            }
            self.read_set.entry(account).or_insert(value.version());
        }
        Ok(value.balance())
    }

    /// Applies one statement: read the account, pay the statement latency, stage the new balance.
    pub fn apply(&mut self, mutation: BalanceMutation) -> StoreResult<()> {
        let account = mutation.account();
        let balance = self.read(account)?;
        if !self.statement_latency.is_zero() {
            thread::sleep(self.statement_latency);
        }
        self.write_set.insert(account, balance + mutation.delta());
        Ok(())
    }

    pub fn debit(&mut self, account: AccountId) -> StoreResult<()> {
        self.apply(BalanceMutation::Debit(account))
    }

    pub fn credit(&mut self, account: AccountId) -> StoreResult<()> {
        self.apply(BalanceMutation::Credit(account))
    }

    /// Validates and publishes the staged writes.
    ///
    /// Validation and publication happen under the store's commit lock, so
    /// the first of two conflicting transactions to commit wins. Returns the
    /// commit version.
    pub fn commit(mut self) -> StoreResult<u64> {
        let _guard = self.commit_lock.lock();

        let conflicts = detect_conflicts(self.isolation_level, &self.read_set, &self.buffer);
        if let Some(&(account, conflict)) = conflicts.first() {
            debug!(
                "Transaction {} failed validation: {:?} on account {} ({} conflict(s))",
                self.id,
                conflict,
                account,
                conflicts.len()
            );
            return Err(serialization_failure(account));
        }

        let commit_ts = self.transaction_counter.fetch_add(1, Ordering::SeqCst);
        for (account, balance) in self.write_set.drain() {
            self.buffer
                .insert(account, VersionedBalance::new(balance, commit_ts));
        }
        debug!("Transaction {} committed at version {}", self.id, commit_ts);
        Ok(commit_ts)
    }

    /// Discards the staged writes.
    pub fn rollback(self) {
        debug!("Transaction {} rolled back", self.id);
    }
}

fn serialization_failure(account: AccountId) -> StoreError {
    StoreError::Conflict(format!(
        "could not serialize access due to concurrent update of account {}",
        account
    ))
}
