//! Common utilities for Isobench integration tests.
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use isobench::{
    AccountId, AccountStore, BalanceMutation, MemoryStore, SOURCE_ACCOUNT, StoreError,
    StoreResult, SweepSeries, TransactionIsolation,
    report::ResultReporter,
};

// --- ScriptedStore ---

/// A store whose `execute` results are scripted call by call.
///
/// Once the script runs out every call returns `fallback`. Balances are not
/// tracked; `read_balance` returns whatever `balance` is set to.
pub struct ScriptedStore {
    script: Mutex<VecDeque<StoreResult<()>>>,
    fallback: StoreResult<()>,
    executions: AtomicUsize,
    balance: i64,
}

impl ScriptedStore {
    pub fn new(script: Vec<StoreResult<()>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Ok(()),
            executions: AtomicUsize::new(0),
            balance: 0,
        }
    }

    /// A store that reports a serialization conflict on every attempt.
    pub fn always_conflicting() -> Self {
        Self {
            fallback: Err(conflict()),
            ..Self::new(Vec::new())
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl AccountStore for ScriptedStore {
    fn reset_to_baseline(&self, _universe: &[AccountId]) -> StoreResult<()> {
        Ok(())
    }

    fn read_balance(&self, _account: AccountId) -> StoreResult<i64> {
        Ok(self.balance)
    }

    fn execute(
        &self,
        _isolation: TransactionIsolation,
        _mutations: &[BalanceMutation],
    ) -> StoreResult<()> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn conflict() -> StoreError {
    StoreError::Conflict("could not serialize access due to concurrent update".to_string())
}

// --- SlowStore ---

/// Sleeps for `delay` in every `execute`, then commits.
pub struct SlowStore {
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl AccountStore for SlowStore {
    fn reset_to_baseline(&self, _universe: &[AccountId]) -> StoreResult<()> {
        Ok(())
    }

    fn read_balance(&self, _account: AccountId) -> StoreResult<i64> {
        Ok(0)
    }

    fn execute(
        &self,
        _isolation: TransactionIsolation,
        _mutations: &[BalanceMutation],
    ) -> StoreResult<()> {
        thread::sleep(self.delay);
        Ok(())
    }
}

// --- PanickingStore ---

/// Panics inside `execute` for any transaction that credits `account`.
pub struct PanickingStore {
    pub account: AccountId,
}

impl AccountStore for PanickingStore {
    fn reset_to_baseline(&self, _universe: &[AccountId]) -> StoreResult<()> {
        Ok(())
    }

    fn read_balance(&self, _account: AccountId) -> StoreResult<i64> {
        Ok(0)
    }

    fn execute(
        &self,
        _isolation: TransactionIsolation,
        mutations: &[BalanceMutation],
    ) -> StoreResult<()> {
        if mutations.contains(&BalanceMutation::Credit(self.account)) {
            panic!("boom on account {}", self.account);
        }
        Ok(())
    }
}

// --- FaultyStore ---

/// Wraps a `MemoryStore` and injects faults by call number (1-based).
///
/// - `fail_resets`: reset calls that fail.
/// - `fail_reads`: `read_balance` calls that fail. The sweep reads once to
///   verify each reset and once more for the final balance.
/// - `corrupt_after_reset`: after the given reset call, the first
///   transaction finds the source balance shifted by the given amount.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    fail_resets: HashSet<usize>,
    fail_reads: HashSet<usize>,
    corrupt_after_reset: Option<(usize, i64)>,
    resets: AtomicUsize,
    reads: AtomicUsize,
    pending_corruption: Mutex<Option<i64>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_resets(mut self, calls: &[usize]) -> Self {
        self.fail_resets = calls.iter().copied().collect();
        self
    }

    pub fn failing_reads(mut self, calls: &[usize]) -> Self {
        self.fail_reads = calls.iter().copied().collect();
        self
    }

    pub fn corrupting_after_reset(mut self, call: usize, delta: i64) -> Self {
        self.corrupt_after_reset = Some((call, delta));
        self
    }
}

impl AccountStore for FaultyStore {
    fn reset_to_baseline(&self, universe: &[AccountId]) -> StoreResult<()> {
        let call = self.resets.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_resets.contains(&call) {
            return Err(StoreError::Other(format!("reset {} refused", call)));
        }
        self.inner.reset_to_baseline(universe)?;
        if let Some((target, delta)) = self.corrupt_after_reset {
            if target == call {
                *self.pending_corruption.lock().unwrap() = Some(delta);
            }
        }
        Ok(())
    }

    fn read_balance(&self, account: AccountId) -> StoreResult<i64> {
        let call = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_reads.contains(&call) {
            return Err(StoreError::Other(format!("read {} refused", call)));
        }
        self.inner.read_balance(account)
    }

    fn execute(
        &self,
        isolation: TransactionIsolation,
        mutations: &[BalanceMutation],
    ) -> StoreResult<()> {
        if let Some(delta) = self.pending_corruption.lock().unwrap().take() {
            let source = self.inner.read_balance(SOURCE_ACCOUNT)?;
            self.inner.set_balance(SOURCE_ACCOUNT, source + delta);
        }
        self.inner.execute(isolation, mutations)
    }
}

// --- Reporters ---

/// Collects the label of every series it is handed.
#[derive(Default)]
pub struct CollectingReporter {
    pub labels: Vec<String>,
}

impl ResultReporter for CollectingReporter {
    fn report(&mut self, series: &SweepSeries) -> isobench::Result<()> {
        self.labels.push(series.label());
        Ok(())
    }
}

// --- Helper Functions ---

/// Accounts `1..=n`.
pub fn universe(n: i64) -> Vec<AccountId> {
    (1..=n).collect()
}

/// A memory store reset to the baseline of `universe`.
pub fn setup_memory_store(universe: &[AccountId], latency: Duration) -> Arc<MemoryStore> {
    let store = MemoryStore::new().with_statement_latency(latency);
    store.reset_to_baseline(universe).unwrap();
    Arc::new(store)
}

/// Sum of every destination balance, i.e. the number of credits that landed.
pub fn credited(store: &MemoryStore) -> i64 {
    store
        .balances()
        .into_iter()
        .filter(|(account, _)| *account != SOURCE_ACCOUNT)
        .map(|(_, balance)| balance)
        .sum()
}
