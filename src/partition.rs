use crate::errors::{BenchError, Result};
use crate::store::AccountId;

/// A contiguous slice of the account universe owned by one worker for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    index: usize,
    accounts: Vec<AccountId>,
}

impl Chunk {
    /// Position of this chunk in the partition, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn accounts(&self) -> &[AccountId] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Splits `universe` into contiguous chunks of at most `k` accounts.
///
/// Chunks keep the universe's order, never overlap, and concatenate back to
/// `universe`. Only the last chunk may be shorter than `k`. An empty universe
/// yields no chunks.
///
/// # Errors
///
/// Returns [`BenchError::InvalidChunkSize`] when `k` is zero.
pub fn partition(universe: &[AccountId], k: usize) -> Result<Vec<Chunk>> {
    if k == 0 {
        return Err(BenchError::InvalidChunkSize(k));
    }
    Ok(universe
        .chunks(k)
        .enumerate()
        .map(|(index, accounts)| Chunk {
            index,
            accounts: accounts.to_vec(),
        })
        .collect())
}
