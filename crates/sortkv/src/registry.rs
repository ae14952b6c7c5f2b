//! Type registry
//!
//! Each lookup is an independent point read against the tag region. Nothing
//! is cached, so a tag written by one caller is visible to the next lookup.

use crate::error::Result;
use crate::keyspace::{encode, Keyspace, TYPE_REGION};
use crate::types::KeyType;

impl Keyspace {
    /// Type tag recorded for `key`, `None` when the key has no tag or does
    /// not exist
    pub fn type_of(&self, key: &[u8]) -> Result<Option<KeyType>> {
        if key.is_empty() {
            return Ok(None);
        }
        match self.store.get(&encode(TYPE_REGION, key))? {
            Some(tag) if tag.is_empty() => Ok(None),
            Some(tag) => KeyType::from_bytes(&tag).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::keyspace::{encode, TYPE_REGION};
    use crate::types::KeyType;
    use crate::{KeyspaceError, Keyspace};

    #[test]
    fn test_type_of_missing_key() {
        let ks = Keyspace::in_memory();
        assert_eq!(ks.type_of(b"nope").unwrap(), None);
        assert_eq!(ks.type_of(b"").unwrap(), None);
    }

    #[test]
    fn test_type_of_tracks_writes() {
        let ks = Keyspace::in_memory();
        ks.put(b"s", KeyType::String, b"v").unwrap();
        ks.put(b"l", KeyType::List, b"").unwrap();
        assert_eq!(ks.type_of(b"s").unwrap(), Some(KeyType::String));
        assert_eq!(ks.type_of(b"l").unwrap(), Some(KeyType::List));

        ks.put(b"s", KeyType::Set, b"").unwrap();
        assert_eq!(ks.type_of(b"s").unwrap(), Some(KeyType::Set));
    }

    #[test]
    fn test_type_of_unknown_tag() {
        let ks = Keyspace::in_memory();
        ks.store.set(&encode(TYPE_REGION, b"z"), b"zset").unwrap();
        assert!(matches!(ks.type_of(b"z"), Err(KeyspaceError::CorruptTypeTag(_))));
    }
}
