//! Hash type built on the raw namespace
//!
//! A hash owns a user entry tagged `hash` with an empty value. Each field is a
//! raw entry keyed `+[hash]` ++ u32-BE(len(key)) ++ key ++ field. The length
//! prefix keeps the field ranges of two hashes from overlapping.

use crate::error::{KeyspaceError, Result};
use crate::keyspace::{encode, prefix_successor, require_key, Keyspace, RAW_REGION, TYPE_REGION, USER_REGION};
use crate::store::Mutation;
use crate::types::{Direction, KeyType, Visit};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use tokio_util::sync::CancellationToken;

/// Raw key prefix shared by every hash field
pub const HASH_FIELD_PREFIX: &[u8] = b"+[hash]";

/// Big-endian length that separates a hash key from its field names
fn key_len_prefix(len: usize) -> Result<[u8; 4]> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| KeyspaceError::KeyTooLong(len))
}

/// Raw-namespace prefix covering all fields of `key`
pub fn hash_fields_prefix(key: &[u8]) -> Result<Vec<u8>> {
    let len = key_len_prefix(key.len())?;
    let mut out = Vec::with_capacity(HASH_FIELD_PREFIX.len() + 4 + key.len());
    out.extend_from_slice(HASH_FIELD_PREFIX);
    out.extend_from_slice(&len);
    out.extend_from_slice(key);
    Ok(out)
}

/// Raw-namespace key holding `field` of hash `key`
pub fn hash_field_key(key: &[u8], field: &[u8]) -> Result<Vec<u8>> {
    let mut out = hash_fields_prefix(key)?;
    out.extend_from_slice(field);
    Ok(out)
}

impl Keyspace {
    /// Type check shared by all hash commands. Returns whether the hash exists
    fn check_hash(&self, key: &[u8]) -> Result<bool> {
        require_key(key)?;
        match self.type_of(key)? {
            Some(KeyType::Hash) => Ok(true),
            None => Ok(false),
            Some(other) => Err(KeyspaceError::WrongType {
                key: key.to_vec(),
                actual: other.as_str(),
            }),
        }
    }

    /// Visit every field of `key` in field byte order
    fn visit_hash_fields(
        &self,
        key: &[u8],
        cancel: &CancellationToken,
        mut visit: impl FnMut(&[u8], &[u8]) -> Visit,
    ) -> Result<()> {
        let prefix = hash_fields_prefix(key)?;
        let lower = encode(RAW_REGION, &prefix);
        let upper = prefix_successor(&lower);
        let upper = match &upper {
            Some(bound) => Bound::Excluded(&bound[..]),
            None => Bound::Unbounded,
        };
        let strip = prefix.len();
        self.scan_region(Bound::Included(&lower[..]), upper, Direction::Forward, cancel, |raw_key, value| {
            visit(&raw_key[strip..], value)
        })
    }

    /// Set fields, returning how many of them did not exist before
    pub fn hset(&self, key: &[u8], pairs: &[(Vec<u8>, Vec<u8>)]) -> Result<usize> {
        let _guard = self.lock_writes();
        let exists = self.check_hash(key)?;

        // Last write wins for fields repeated within one call
        let fields: BTreeMap<&[u8], &[u8]> = pairs
            .iter()
            .map(|(field, value)| (field.as_slice(), value.as_slice()))
            .collect();

        let mut batch = Vec::with_capacity(fields.len() + 2);
        for (field, value) in fields {
            batch.push(Mutation::put(encode(RAW_REGION, &hash_field_key(key, field)?), value));
        }
        let field_count = batch.len();
        if !exists {
            batch.push(Mutation::put(encode(USER_REGION, key), Vec::new()));
            batch.push(Mutation::put(encode(TYPE_REGION, key), KeyType::Hash.as_str()));
        }
        let present = self.store.apply(&batch)?;
        Ok(present.iter().take(field_count).filter(|p| !**p).count())
    }

    /// Read one field
    pub fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
        if !self.check_hash(key)? {
            return Ok(None);
        }
        self.store.get(&encode(RAW_REGION, &hash_field_key(key, field)?))
    }

    /// Remove fields, returning how many existed
    ///
    /// Removing the last field removes the hash itself, in the same batch.
    pub fn hdel(&self, key: &[u8], fields: &[Vec<u8>]) -> Result<usize> {
        let _guard = self.lock_writes();
        if !self.check_hash(key)? {
            return Ok(0);
        }
        let doomed: BTreeSet<&[u8]> = fields.iter().map(|field| field.as_slice()).collect();
        let mut batch = Vec::with_capacity(doomed.len() + 2);
        for field in &doomed {
            batch.push(Mutation::delete(encode(RAW_REGION, &hash_field_key(key, field)?)));
        }
        let field_count = batch.len();

        let mut survivor = false;
        self.visit_hash_fields(key, &CancellationToken::new(), |field, _| {
            if doomed.contains(field) {
                Visit::Continue
            } else {
                survivor = true;
                Visit::Stop
            }
        })?;
        if !survivor {
            batch.push(Mutation::delete(encode(USER_REGION, key)));
            batch.push(Mutation::delete(encode(TYPE_REGION, key)));
        }
        let present = self.store.apply(&batch)?;
        Ok(present.iter().take(field_count).filter(|p| **p).count())
    }

    /// All fields and values in field byte order
    pub fn hgetall(&self, key: &[u8], cancel: &CancellationToken) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        if !self.check_hash(key)? {
            return Ok(Vec::new());
        }
        let mut pairs = Vec::new();
        self.visit_hash_fields(key, cancel, |field, value| {
            pairs.push((field.to_vec(), value.to_vec()));
            Visit::Continue
        })?;
        Ok(pairs)
    }

    /// Queue deletes for every raw field entry of `key`
    ///
    /// Callers hold the write lock until `batch` is applied.
    pub(crate) fn push_hash_field_deletes(&self, key: &[u8], batch: &mut Vec<Mutation>) -> Result<()> {
        let prefix = hash_fields_prefix(key)?;
        self.visit_hash_fields(key, &CancellationToken::new(), |field, _| {
            let mut raw_key = prefix.clone();
            raw_key.extend_from_slice(field);
            batch.push(Mutation::delete(encode(RAW_REGION, &raw_key)));
            Visit::Continue
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(field: &str, value: &str) -> (Vec<u8>, Vec<u8>) {
        (field.as_bytes().to_vec(), value.as_bytes().to_vec())
    }

    #[test]
    fn test_hset_counts_new_fields() {
        let ks = Keyspace::in_memory();
        assert_eq!(ks.hset(b"h", &[pair("a", "1"), pair("b", "2")]).unwrap(), 2);
        assert_eq!(ks.hset(b"h", &[pair("a", "3"), pair("c", "4")]).unwrap(), 1);
        assert_eq!(ks.hset(b"h", &[pair("d", "1"), pair("d", "2")]).unwrap(), 1);

        assert_eq!(ks.hget(b"h", b"a").unwrap(), Some(b"3".to_vec()));
        assert_eq!(ks.hget(b"h", b"d").unwrap(), Some(b"2".to_vec()));
        assert_eq!(ks.type_of(b"h").unwrap(), Some(KeyType::Hash));
    }

    #[test]
    fn test_hget_missing() {
        let ks = Keyspace::in_memory();
        assert_eq!(ks.hget(b"none", b"f").unwrap(), None);
        ks.hset(b"h", &[pair("a", "1")]).unwrap();
        assert_eq!(ks.hget(b"h", b"zz").unwrap(), None);
    }

    #[test]
    fn test_fields_live_in_raw_namespace() {
        let ks = Keyspace::in_memory();
        ks.hset(b"name", &[pair("first", "late")]).unwrap();
        let raw = hash_field_key(b"name", b"first").unwrap();
        assert!(raw.starts_with(HASH_FIELD_PREFIX));
        assert_eq!(ks.raw_get(&raw).unwrap(), Some(b"late".to_vec()));
        assert_eq!(ks.get(b"name").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_hashes_with_shared_prefix_do_not_alias() {
        let ks = Keyspace::in_memory();
        ks.hset(b"a", &[pair("bc", "1")]).unwrap();
        ks.hset(b"ab", &[pair("c", "2")]).unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(ks.hgetall(b"a", &cancel).unwrap(), vec![pair("bc", "1")]);
        assert_eq!(ks.hgetall(b"ab", &cancel).unwrap(), vec![pair("c", "2")]);
    }

    #[test]
    fn test_hgetall_in_field_order() {
        let ks = Keyspace::in_memory();
        ks.hset(b"h", &[pair("z", "1"), pair("a", "2"), pair("m", "3")]).unwrap();
        let all = ks.hgetall(b"h", &CancellationToken::new()).unwrap();
        assert_eq!(all, vec![pair("a", "2"), pair("m", "3"), pair("z", "1")]);
    }

    #[test]
    fn test_hdel_last_field_removes_hash() {
        let ks = Keyspace::in_memory();
        ks.hset(b"h", &[pair("a", "1"), pair("b", "2")]).unwrap();
        assert_eq!(ks.hdel(b"h", &[b"a".to_vec(), b"x".to_vec()]).unwrap(), 1);
        assert_eq!(ks.type_of(b"h").unwrap(), Some(KeyType::Hash));

        assert_eq!(ks.hdel(b"h", &[b"b".to_vec()]).unwrap(), 1);
        assert_eq!(ks.type_of(b"h").unwrap(), None);
        assert_eq!(ks.get(b"h").unwrap(), None);
    }

    #[test]
    fn test_del_removes_fields() {
        let ks = Keyspace::in_memory();
        ks.hset(b"h", &[pair("a", "1"), pair("b", "2")]).unwrap();
        assert_eq!(ks.delete(&[b"h".to_vec()]).unwrap(), 1);
        assert_eq!(ks.raw_get(&hash_field_key(b"h", b"a").unwrap()).unwrap(), None);
        assert_eq!(ks.raw_get(&hash_field_key(b"h", b"b").unwrap()).unwrap(), None);
    }

    #[test]
    fn test_hash_commands_reject_other_types() {
        let ks = Keyspace::in_memory();
        ks.set_string(b"s", b"v").unwrap();
        assert!(matches!(
            ks.hset(b"s", &[pair("a", "1")]),
            Err(KeyspaceError::WrongType { actual: "string", .. })
        ));
        assert!(matches!(ks.hget(b"s", b"a"), Err(KeyspaceError::WrongType { .. })));
        assert!(matches!(ks.hdel(b"s", &[b"a".to_vec()]), Err(KeyspaceError::WrongType { .. })));
    }

    #[test]
    fn test_hdel_counts_repeated_field_once() {
        let ks = Keyspace::in_memory();
        ks.hset(b"h", &[pair("a", "1"), pair("b", "2")]).unwrap();
        assert_eq!(ks.hdel(b"h", &[b"a".to_vec(), b"a".to_vec()]).unwrap(), 1);
        assert_eq!(ks.hgetall(b"h", &CancellationToken::new()).unwrap(), vec![pair("b", "2")]);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_oversize_key_length_rejected() {
        let len = u32::MAX as usize + 1;
        assert_eq!(key_len_prefix(len), Err(KeyspaceError::KeyTooLong(len)));
        assert_eq!(key_len_prefix(u32::MAX as usize), Ok([0xff; 4]));
        assert_eq!(key_len_prefix(3), Ok([0, 0, 0, 3]));
    }

    #[test]
    fn test_concurrent_hset_hdel_keep_tag_consistent() {
        let ks = Keyspace::in_memory();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let ks = ks.clone();
                std::thread::spawn(move || {
                    let field = format!("f{}", t);
                    for _ in 0..200 {
                        ks.hset(b"h", &[pair(&field, "v")]).unwrap();
                        ks.hdel(b"h", &[field.as_bytes().to_vec()]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Every field was removed again, so the hash must be gone entirely
        let all = ks.hgetall(b"h", &CancellationToken::new()).unwrap();
        assert!(all.is_empty());
        assert_eq!(ks.type_of(b"h").unwrap(), None);
        assert_eq!(ks.get(b"h").unwrap(), None);
    }
}
