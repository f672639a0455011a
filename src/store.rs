use crate::errors::StoreResult;
use crate::TransactionIsolation;

/// Identifier of a row in the `accounts` table.
pub type AccountId = i64;

/// The distinguished account every worker debits. It is never part of a
/// partitioned universe but is always present in the store.
pub const SOURCE_ACCOUNT: AccountId = 0;

/// Balance the source account holds after a reset of `universe`.
///
/// One unit per destination account, so that a run in which every transfer
/// lands drains the source to exactly zero. For the classic universe
/// `1..=100` this is 100.
pub fn baseline_balance(universe: &[AccountId]) -> i64 {
    universe.len() as i64
}

/// A single statement of a transfer transaction.
///
/// `BalanceMutation` is what the executor hands to the store, in order. The
/// store must apply the whole list inside one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceMutation {
    /// `UPDATE accounts SET balance = balance - 1 WHERE accno = id`
    Debit(AccountId),
    /// `UPDATE accounts SET balance = balance + 1 WHERE accno = id`
    Credit(AccountId),
}

impl BalanceMutation {
    pub fn account(&self) -> AccountId {
        match self {
            BalanceMutation::Debit(id) | BalanceMutation::Credit(id) => *id,
        }
    }

    /// Signed change this mutation applies to its account.
    pub fn delta(&self) -> i64 {
        match self {
            BalanceMutation::Debit(_) => -1,
            BalanceMutation::Credit(_) => 1,
        }
    }
}

/// Trait for the relational store a benchmark runs against.
///
/// The benchmark never implements isolation itself; it measures what an
/// `AccountStore` provides. Implementations classify their own failures into
/// [`StoreError::Conflict`](crate::StoreError::Conflict) and
/// [`StoreError::Other`](crate::StoreError::Other).
///
/// Implementations must be `Send` and `Sync`: every worker thread calls
/// [`AccountStore::execute`] concurrently, and each call must use its own
/// connection or session so that transaction boundaries never leak between
/// workers.
pub trait AccountStore: Send + Sync {
    /// Restores the baseline: the source account holds
    /// [`baseline_balance`]`(universe)`, every account in `universe` holds 0,
    /// and no other rows exist.
    ///
    /// Must not return before the baseline is visible to subsequent
    /// transactions. Calling it twice in a row is harmless.
    fn reset_to_baseline(&self, universe: &[AccountId]) -> StoreResult<()>;

    /// Reads the committed balance of `account`.
    fn read_balance(&self, account: AccountId) -> StoreResult<i64>;

    /// Applies `mutations`, in order, inside one transaction at `isolation`.
    ///
    /// Either every mutation commits or none does. On a serialization
    /// failure the implementation returns `StoreError::Conflict`.
    fn execute(
        &self,
        isolation: TransactionIsolation,
        mutations: &[BalanceMutation],
    ) -> StoreResult<()>;
}
