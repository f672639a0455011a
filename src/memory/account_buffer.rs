use crossbeam_skiplist::SkipMap;

use crate::memory::versioned_value::VersionedBalance;
use crate::store::AccountId;

/// The committed state of every account, held in a lock-free `SkipMap`.
///
/// Individual gets and inserts are atomic per account. Multi-account
/// atomicity (a whole commit, a whole reset) is the caller's job.
pub struct AccountBuffer {
    data: SkipMap<AccountId, VersionedBalance>,
}

impl Default for AccountBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountBuffer {
    /// Creates a new, empty `AccountBuffer`.
    pub fn new() -> Self {
        Self {
            data: SkipMap::new(),
        }
    }

    /// Retrieves the committed value of `account`, if the account exists.
    pub fn get(&self, account: AccountId) -> Option<VersionedBalance> {
        self.data.get(&account).map(|entry| *entry.value())
    }

    /// Inserts or replaces the committed value of `account`.
    pub fn insert(&self, account: AccountId, value: VersionedBalance) {
        self.data.insert(account, value);
    }

    /// Drops every account.
    pub fn clear(&self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Snapshot of all `(account, balance)` pairs in account order.
    pub fn balances(&self) -> Vec<(AccountId, i64)> {
        self.data
            .iter()
            .map(|entry| (*entry.key(), entry.value().balance()))
            .collect()
    }
}
