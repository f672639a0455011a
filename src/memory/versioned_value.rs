/// An account balance together with the version that last committed it.
///
/// Versions come from the store's transaction counter, so a larger version
/// always means a later commit. Commit validation compares the version a
/// transaction read against the version currently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionedBalance {
    /// The committed balance.
    balance: i64,
    /// The commit timestamp of the transaction that wrote this balance.
    version: u64,
}

impl VersionedBalance {
    /// Creates a new `VersionedBalance`.
    ///
    /// # Examples
    ///
    /// ```
    /// use isobench::prelude::*;
    ///
    /// let value = VersionedBalance::new(100, 1);
    /// assert_eq!(value.balance(), 100);
    /// assert_eq!(value.version(), 1);
    /// ```
    pub fn new(balance: i64, version: u64) -> Self {
        Self { balance, version }
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
