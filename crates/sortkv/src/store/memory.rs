//! In-memory ordered store backed by a `BTreeMap`

use super::{is_empty_range, Mutation, OrderedStore, ScanVisitor};
use crate::error::Result;
use crate::types::{Direction, Visit};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Volatile ordered store, used by tests and `--in-memory` servers
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physical entries across all regions
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn apply(&self, batch: &[Mutation]) -> Result<Vec<bool>> {
        let mut guard = self.data.write();
        let present = batch
            .iter()
            .map(|mutation| match mutation {
                Mutation::Put { key, value } => guard.insert(key.clone(), value.clone()).is_some(),
                Mutation::Delete { key } => guard.remove(key).is_some(),
            })
            .collect();
        Ok(present)
    }

    fn scan(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        direction: Direction,
        visit: &mut ScanVisitor<'_>,
    ) -> Result<()> {
        // BTreeMap::range panics on inverted bounds
        if is_empty_range(lower, upper) {
            return Ok(());
        }
        let guard = self.data.read();
        let mut range = guard.range::<[u8], _>((lower, upper));
        let mut index = 0;
        loop {
            let next = match direction {
                Direction::Forward => range.next(),
                Direction::Backward => range.next_back(),
            };
            let Some((key, value)) = next else { break };
            if visit(index, key, value) == Visit::Stop {
                break;
            }
            index += 1;
        }
        Ok(())
    }
}
