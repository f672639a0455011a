use ahash::AHashMap as HashMap;

use crate::memory::account_buffer::AccountBuffer;
use crate::store::AccountId;
use crate::TransactionIsolation;

/// Represents the type of conflict detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictType {
    /// The transaction read an account that another transaction committed since.
    ReadWrite,
    /// The transaction read an account that has since disappeared (e.g. a reset).
    ReadDelete,
}

/// Validates a transaction's read set against the committed state.
///
/// This is optimistic concurrency control: under `RepeatableRead` and
/// `Serializable` every account the transaction read must still carry the
/// version it was read at. Every account in the transfer workload is read
/// before it is written, so this also catches write-write conflicts.
/// `ReadCommitted` validates nothing, which is what lets concurrent
/// decrements of the source overwrite each other.
///
/// Returns the conflicting accounts, sorted by account id.
pub fn detect_conflicts(
    isolation_level: TransactionIsolation,
    read_set: &HashMap<AccountId, u64>,
    buffer: &AccountBuffer,
) -> Vec<(AccountId, ConflictType)> {
    if !isolation_level.validates_reads() {
        return Vec::new();
    }

    let mut conflicts: Vec<(AccountId, ConflictType)> = read_set
        .iter()
        .filter_map(|(&account, &read_version)| match buffer.get(account) {
            Some(current) if current.version() > read_version => {
                Some((account, ConflictType::ReadWrite))
            }
            Some(_) => None,
            None => Some((account, ConflictType::ReadDelete)),
        })
        .collect();
    conflicts.sort_by_key(|(account, _)| *account);
    conflicts
}
