//! Ordered byte store abstraction
//!
//! The keyspace engine consumes the persistent engine only through
//! [`OrderedStore`]: point reads, atomic write batches that report which keys
//! were present, and bounded range scans in either direction.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::error::Result;
use crate::types::{Direction, Visit};
use std::ops::Bound;

/// A single write inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl Mutation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Mutation::Put { key: key.into(), value: value.into() }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Mutation::Delete { key: key.into() }
    }
}

/// Visitor invoked once per entry: `(index, key, value)`
///
/// The visitor runs while the store holds its read view open and must not
/// call back into the store.
pub type ScanVisitor<'a> = dyn FnMut(usize, &[u8], &[u8]) -> Visit + 'a;

/// Persistent engine that keeps entries sorted by key bytes
///
/// Every call is internally consistent on its own. No snapshot is shared
/// across calls.
pub trait OrderedStore: Send + Sync {
    /// Point lookup
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Apply all mutations atomically, in order
    ///
    /// Returns one flag per mutation: whether its key held a value right
    /// before that mutation ran.
    fn apply(&self, batch: &[Mutation]) -> Result<Vec<bool>>;

    /// Visit entries within `(lower, upper)` in `direction` until the visitor
    /// stops or the range is exhausted
    fn scan(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        direction: Direction,
        visit: &mut ScanVisitor<'_>,
    ) -> Result<()>;

    /// Unconditional single-key write
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.apply(&[Mutation::put(key, value)])?;
        Ok(())
    }

    /// Remove keys in one batch, returning how many were present
    fn delete(&self, keys: &[Vec<u8>]) -> Result<usize> {
        let batch: Vec<Mutation> = keys.iter().map(|key| Mutation::delete(key.as_slice())).collect();
        Ok(self.apply(&batch)?.into_iter().filter(|present| *present).count())
    }
}

/// True when no key can fall inside `(lower, upper)`
pub(crate) fn is_empty_range(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi))
        | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_range_detection() {
        use Bound::*;
        assert!(!is_empty_range(Included(&b"a"[..]), Included(&b"a"[..])));
        assert!(is_empty_range(Included(&b"a"[..]), Excluded(&b"a"[..])));
        assert!(is_empty_range(Included(&b"b"[..]), Included(&b"a"[..])));
        assert!(!is_empty_range(Unbounded, Excluded(&b"a"[..])));
        assert!(!is_empty_range(Included(&b"a"[..]), Unbounded));
    }
}
