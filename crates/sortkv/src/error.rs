//! Keyspace error types

use thiserror::Error;

/// Result type alias for keyspace operations
pub type Result<T> = std::result::Result<T, KeyspaceError>;

/// Errors surfaced by the keyspace engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyspaceError {
    #[error("empty key")]
    EmptyKey,

    #[error("key too long: {0} bytes")]
    KeyTooLong(usize),

    #[error("count range: 1 <= count <= 10000, got {0}")]
    InvalidCount(i64),

    #[error("key {} holds a {actual} value", String::from_utf8_lossy(.key))]
    WrongType { key: Vec<u8>, actual: &'static str },

    #[error("unrecognized type tag: {}", String::from_utf8_lossy(.0))]
    CorruptTypeTag(Vec<u8>),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("scan cancelled")]
    Cancelled,
}

impl KeyspaceError {
    /// Wrap any storage-engine error
    pub fn storage(err: impl std::fmt::Display) -> Self {
        KeyspaceError::Storage(err.to_string())
    }
}
