//! Persistent ordered store backed by redb
//!
//! All regions of the keyspace share one table so that a single write
//! transaction covers a user entry, its type tag and any raw entries.

use super::{is_empty_range, Mutation, OrderedStore, ScanVisitor};
use crate::error::{KeyspaceError, Result};
use crate::types::{Direction, Visit};
use redb::{Database, ReadableTable, TableDefinition};
use std::ops::Bound;
use std::path::Path;
use tracing::info;

const KEYSPACE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("keyspace");

/// redb-backed ordered store
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open the database file at `path`, creating it (and its parent
    /// directory) if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(KeyspaceError::storage)?;
        }
        let db = Database::create(path).map_err(KeyspaceError::storage)?;

        // Make sure the table exists so read transactions can open it
        let txn = db.begin_write().map_err(KeyspaceError::storage)?;
        txn.open_table(KEYSPACE).map_err(KeyspaceError::storage)?;
        txn.commit().map_err(KeyspaceError::storage)?;

        info!("Opened redb store at {}", path.display());
        Ok(Self { db })
    }
}

impl OrderedStore for RedbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(KeyspaceError::storage)?;
        let table = txn.open_table(KEYSPACE).map_err(KeyspaceError::storage)?;
        let value = table
            .get(key)
            .map_err(KeyspaceError::storage)?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn apply(&self, batch: &[Mutation]) -> Result<Vec<bool>> {
        let txn = self.db.begin_write().map_err(KeyspaceError::storage)?;
        let mut present = Vec::with_capacity(batch.len());
        {
            let mut table = txn.open_table(KEYSPACE).map_err(KeyspaceError::storage)?;
            for mutation in batch {
                let previous = match mutation {
                    Mutation::Put { key, value } => table
                        .insert(key.as_slice(), value.as_slice())
                        .map_err(KeyspaceError::storage)?
                        .is_some(),
                    Mutation::Delete { key } => table
                        .remove(key.as_slice())
                        .map_err(KeyspaceError::storage)?
                        .is_some(),
                };
                present.push(previous);
            }
        }
        txn.commit().map_err(KeyspaceError::storage)?;
        Ok(present)
    }

    fn scan(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        direction: Direction,
        visit: &mut ScanVisitor<'_>,
    ) -> Result<()> {
        if is_empty_range(lower, upper) {
            return Ok(());
        }
        let txn = self.db.begin_read().map_err(KeyspaceError::storage)?;
        let table = txn.open_table(KEYSPACE).map_err(KeyspaceError::storage)?;
        let mut range = table
            .range::<&[u8]>((lower, upper))
            .map_err(KeyspaceError::storage)?;
        let mut index = 0;
        loop {
            let next = match direction {
                Direction::Forward => range.next(),
                Direction::Backward => range.next_back(),
            };
            let Some(item) = next else { break };
            let (key, value) = item.map_err(KeyspaceError::storage)?;
            if visit(index, key.value(), value.value()) == Visit::Stop {
                break;
            }
            index += 1;
        }
        Ok(())
    }
}
