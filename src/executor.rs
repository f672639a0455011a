use std::sync::Arc;

use log::debug;

use crate::errors::StoreResult;
use crate::partition::Chunk;
use crate::store::{AccountStore, BalanceMutation, SOURCE_ACCOUNT};
use crate::TransactionIsolation;

/// Runs the salary-transfer workload for one chunk as a single store transaction.
///
/// For every account `a` of the chunk the transaction first debits
/// [`SOURCE_ACCOUNT`] and then credits `a`. All workers debit the same source
/// row, which is where write-write conflicts (strict isolation) or lost
/// updates (weak isolation) come from.
#[derive(Clone)]
pub struct TransactionExecutor {
    store: Arc<dyn AccountStore>,
}

impl TransactionExecutor {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Builds the ordered statements of the transfer transaction for `chunk`.
    pub fn transfer_mutations(chunk: &Chunk) -> Vec<BalanceMutation> {
        chunk
            .accounts()
            .iter()
            .flat_map(|&account| {
                [
                    BalanceMutation::Debit(SOURCE_ACCOUNT),
                    BalanceMutation::Credit(account),
                ]
            })
            .collect()
    }

    /// Executes one attempt of the transfer for `chunk` at `isolation`.
    ///
    /// Returns `Ok(())` once the transaction committed. Errors come back
    /// already classified by the store, so the caller can tell a conflict
    /// from any other failure.
    pub fn execute(&self, chunk: &Chunk, isolation: TransactionIsolation) -> StoreResult<()> {
        let mutations = Self::transfer_mutations(chunk);
        debug!(
            "Chunk {} executing {} statements at {}",
            chunk.index(),
            mutations.len(),
            isolation
        );
        self.store.execute(isolation, &mutations)
    }
}
