//! Key-space scanning and raw-access engine for sortkv
//!
//! # Features
//! - Ordered byte store abstraction with redb and in-memory backends
//! - Cursor-based, bounded, bidirectional enumeration of user keys
//! - Prefix search over the user and raw namespaces
//! - Raw namespace access used as the substrate for composite types
//! - Hash type encoded as one raw entry per field

pub mod enumerate;
pub mod error;
pub mod hash;
pub mod keyspace;
pub mod raw;
pub mod registry;
pub mod search;
pub mod store;
pub mod types;

pub use error::{KeyspaceError, Result};
pub use keyspace::Keyspace;
pub use store::{MemoryStore, OrderedStore, RedbStore};
pub use types::{Direction, KeyEntry, KeyType, ScanCount, Visit, MAX_SCAN_COUNT};

pub use tokio_util::sync::CancellationToken;
