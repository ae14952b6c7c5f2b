//! Raw namespace access
//!
//! Unmediated byte reads and writes with no type tag involvement. Composite
//! types store their substructure here, and the same calls serve diagnostics.
//! Callers own raw key construction and must keep it from colliding with the
//! keys other layers build.

use crate::error::Result;
use crate::keyspace::{encode, require_key, Keyspace, RAW_REGION};

impl Keyspace {
    /// Read a raw entry. A missing key yields `None`, never an empty value
    pub fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        require_key(key)?;
        self.store.get(&encode(RAW_REGION, key))
    }

    /// Write a raw entry, overwriting any previous value
    pub fn raw_set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        require_key(key)?;
        self.store.set(&encode(RAW_REGION, key), value)
    }
}
