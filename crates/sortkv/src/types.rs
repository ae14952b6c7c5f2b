//! Keyspace data types
//!
//! Scan parameters, type tags and the entries produced by enumeration.

use crate::error::{KeyspaceError, Result};

/// Upper bound for the number of entries a single scan may return
pub const MAX_SCAN_COUNT: usize = 10_000;

/// Iteration direction over the ordered keyspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending byte order
    Forward,
    /// Descending byte order
    Backward,
}

/// Signal returned by a scan visitor after each entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Stop,
}

/// Validated scan size in `1..=MAX_SCAN_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCount(usize);

impl ScanCount {
    /// Validate a caller-supplied count
    pub fn new(count: i64) -> Result<Self> {
        if count < 1 || count > MAX_SCAN_COUNT as i64 {
            return Err(KeyspaceError::InvalidCount(count));
        }
        Ok(Self(count as usize))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for ScanCount {
    fn default() -> Self {
        Self(1)
    }
}

/// Type tag bound to a user key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    String,
    Hash,
    List,
    Set,
}

impl KeyType {
    /// Label used on the wire and in the tag region
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::Hash => "hash",
            KeyType::List => "list",
            KeyType::Set => "set",
        }
    }

    /// Decode a stored tag
    pub fn from_bytes(tag: &[u8]) -> Result<Self> {
        match tag {
            b"string" => Ok(KeyType::String),
            b"hash" => Ok(KeyType::Hash),
            b"list" => Ok(KeyType::List),
            b"set" => Ok(KeyType::Set),
            other => Err(KeyspaceError::CorruptTypeTag(other.to_vec())),
        }
    }

    /// Label for an optional tag, `none` when absent
    pub fn label(tag: Option<KeyType>) -> &'static str {
        tag.map(KeyType::as_str).unwrap_or("none")
    }
}

/// One user key produced by enumeration or search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub key: Vec<u8>,
    /// Present only when the caller asked for types
    pub key_type: Option<Option<KeyType>>,
    /// Present only when the caller asked for types and values
    pub value: Option<Vec<u8>>,
}

impl KeyEntry {
    /// Flatten into the field sequence used by multi-bulk replies
    pub fn into_fields(self) -> Vec<Vec<u8>> {
        let mut fields = Vec::with_capacity(3);
        fields.push(self.key);
        if let Some(tag) = self.key_type {
            fields.push(KeyType::label(tag).as_bytes().to_vec());
            if let Some(value) = self.value {
                fields.push(value);
            }
        }
        fields
    }
}
