//! Keyspace handle and physical key encoding
//!
//! One ordered store holds every namespace. A leading region byte keeps them
//! apart while preserving byte order inside each region:
//!
//! | region | contents                         |
//! |--------|----------------------------------|
//! | `k`    | user entries (`k` + key -> value) |
//! | `t`    | type tags (`t` + key -> tag)      |
//! | `r`    | raw entries (`r` + key -> value)  |
//!
//! Region bytes never leave this crate: every key handed to a caller has had
//! its region byte stripped.

use crate::error::{KeyspaceError, Result};
use crate::store::{MemoryStore, Mutation, OrderedStore};
use crate::types::{Direction, KeyType, Visit};
use parking_lot::{Mutex, MutexGuard};
use std::ops::Bound;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) const USER_REGION: u8 = b'k';
pub(crate) const TYPE_REGION: u8 = b't';
pub(crate) const RAW_REGION: u8 = b'r';

/// Physical key for `key` inside `region`
pub(crate) fn encode(region: u8, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.push(region);
    out.extend_from_slice(key);
    out
}

/// Exclusive upper bound covering every key of `region`
pub(crate) fn region_end(region: u8) -> [u8; 1] {
    [region + 1]
}

/// Smallest byte string greater than every string starting with `prefix`
///
/// Returns `None` when no such bound exists (the prefix is all `0xFF`).
pub(crate) fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    while let Some(last) = out.pop() {
        if last < u8::MAX {
            out.push(last + 1);
            return Some(out);
        }
    }
    None
}

pub(crate) fn require_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(KeyspaceError::EmptyKey);
    }
    Ok(())
}

/// Shared handle to the keyspace
///
/// Cloning is cheap: all clones use the same underlying store and the same
/// write lock. Writes that read before they write (type checks, hash field
/// lookups) hold the lock until their batch is applied, and every such write
/// reaches the store as a single atomic batch.
#[derive(Clone)]
pub struct Keyspace {
    pub(crate) store: Arc<dyn OrderedStore>,
    write_lock: Arc<Mutex<()>>,
}

impl Keyspace {
    /// Build a keyspace over an explicit store handle
    pub fn new(store: Arc<dyn OrderedStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Keyspace over a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }

    /// Write a user entry and its type tag in one atomic batch
    pub fn put(&self, key: &[u8], key_type: KeyType, value: &[u8]) -> Result<()> {
        require_key(key)?;
        let _guard = self.lock_writes();
        self.store.apply(&[
            Mutation::put(encode(USER_REGION, key), value),
            Mutation::put(encode(TYPE_REGION, key), key_type.as_str()),
        ])?;
        Ok(())
    }

    /// Read a user entry's value regardless of its type
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        require_key(key)?;
        self.store.get(&encode(USER_REGION, key))
    }

    /// Store a string value, replacing a key of any type
    pub fn set_string(&self, key: &[u8], value: &[u8]) -> Result<()> {
        require_key(key)?;
        let _guard = self.lock_writes();
        let mut batch = Vec::with_capacity(2);
        if self.type_of(key)? == Some(KeyType::Hash) {
            self.push_hash_field_deletes(key, &mut batch)?;
        }
        batch.push(Mutation::put(encode(USER_REGION, key), value));
        batch.push(Mutation::put(encode(TYPE_REGION, key), KeyType::String.as_str()));
        self.store.apply(&batch)?;
        Ok(())
    }

    /// Read a string value
    pub fn get_string(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.type_of(key)? {
            Some(KeyType::String) | None => self.get(key),
            Some(other) => Err(KeyspaceError::WrongType {
                key: key.to_vec(),
                actual: other.as_str(),
            }),
        }
    }

    /// Remove user keys together with their type tags
    ///
    /// Hash keys also lose their raw field entries. Everything goes to the
    /// store in one batch. Returns how many of the requested keys were present.
    pub fn delete(&self, keys: &[Vec<u8>]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock_writes();
        let mut batch = Vec::with_capacity(keys.len() * 2);
        let mut user_slots = Vec::with_capacity(keys.len());
        for key in keys {
            if self.type_of(key)? == Some(KeyType::Hash) {
                self.push_hash_field_deletes(key, &mut batch)?;
            }
            user_slots.push(batch.len());
            batch.push(Mutation::delete(encode(USER_REGION, key)));
            batch.push(Mutation::delete(encode(TYPE_REGION, key)));
        }
        let present = self.store.apply(&batch)?;
        let removed = user_slots
            .into_iter()
            .filter(|&slot| present.get(slot).copied().unwrap_or(false))
            .count();
        debug!(requested = keys.len(), removed, "Deleted keys");
        Ok(removed)
    }

    /// Scan one region, handing region-stripped keys to `visit`
    ///
    /// The token is checked before every entry. A cancelled scan returns
    /// [`KeyspaceError::Cancelled`] and whatever `visit` collected is discarded
    /// by the caller.
    pub(crate) fn scan_region(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        direction: Direction,
        cancel: &CancellationToken,
        mut visit: impl FnMut(&[u8], &[u8]) -> Visit,
    ) -> Result<()> {
        let mut cancelled = false;
        self.store.scan(lower, upper, direction, &mut |_, key, value| {
            if cancel.is_cancelled() {
                cancelled = true;
                return Visit::Stop;
            }
            visit(&key[1..], value)
        })?;
        if cancelled {
            return Err(KeyspaceError::Cancelled);
        }
        Ok(())
    }
}
