//! Prefix search over the user and raw namespaces
//!
//! The user variant walks the user region from the prefix and stops at the
//! first key that no longer starts with it. The raw variant keeps the
//! sentinel-byte bound described on [`RAW_SEARCH_SENTINEL`].

use crate::error::Result;
use crate::keyspace::{encode, region_end, require_key, Keyspace, RAW_REGION, USER_REGION};
use crate::types::{Direction, KeyEntry, ScanCount, Visit};
use std::ops::Bound;
use tokio_util::sync::CancellationToken;

/// Byte appended to a raw search prefix to form its exclusive upper bound
///
/// The scan covers `[prefix, prefix ++ 0xFE)`. Raw keys whose byte right after
/// the prefix is `0xFE` or `0xFF` fall outside that range and are not
/// returned. Callers that store such keys must scan with an explicit range.
pub const RAW_SEARCH_SENTINEL: u8 = 254;

impl Keyspace {
    /// First `count` user keys that start with `prefix`, ascending
    pub fn search(
        &self,
        prefix: &[u8],
        count: ScanCount,
        with_type: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<KeyEntry>> {
        require_key(prefix)?;
        let limit = count.get();
        let start = encode(USER_REGION, prefix);
        let end = region_end(USER_REGION);
        let mut keys: Vec<Vec<u8>> = Vec::new();

        self.scan_region(
            Bound::Included(&start[..]),
            Bound::Excluded(&end[..]),
            Direction::Forward,
            cancel,
            |key, _| {
                if !key.starts_with(prefix) {
                    return Visit::Stop;
                }
                keys.push(key.to_vec());
                if keys.len() >= limit {
                    Visit::Stop
                } else {
                    Visit::Continue
                }
            },
        )?;

        keys.into_iter()
            .map(|key| -> Result<KeyEntry> {
                let key_type = if with_type { Some(self.type_of(&key)?) } else { None };
                Ok(KeyEntry { key, key_type, value: None })
            })
            .collect()
    }

    /// First `count` raw keys in `[prefix, prefix ++ RAW_SEARCH_SENTINEL)`
    pub fn raw_search(
        &self,
        prefix: &[u8],
        count: ScanCount,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<u8>>> {
        require_key(prefix)?;
        let limit = count.get();
        let min = encode(RAW_REGION, prefix);
        let mut max = min.clone();
        max.push(RAW_SEARCH_SENTINEL);
        let mut keys = Vec::new();

        self.scan_region(
            Bound::Included(&min[..]),
            Bound::Excluded(&max[..]),
            Direction::Forward,
            cancel,
            |key, _| {
                keys.push(key.to_vec());
                if keys.len() >= limit {
                    Visit::Stop
                } else {
                    Visit::Continue
                }
            },
        )?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyType;
    use crate::KeyspaceError;

    fn count(n: i64) -> ScanCount {
        ScanCount::new(n).unwrap()
    }

    fn names(entries: Vec<KeyEntry>) -> Vec<Vec<u8>> {
        entries.into_iter().map(|e| e.key).collect()
    }

    #[test]
    fn test_search_true_prefix_only() {
        let ks = Keyspace::in_memory();
        for key in ["user:1", "user:2", "user:10", "users", "usa", "v"] {
            ks.set_string(key.as_bytes(), b"x").unwrap();
        }
        let cancel = CancellationToken::new();
        let found = names(ks.search(b"user:", count(10), false, &cancel).unwrap());
        assert_eq!(found, vec![b"user:1".to_vec(), b"user:10".to_vec(), b"user:2".to_vec()]);
    }

    #[test]
    fn test_search_caps_at_count() {
        let ks = Keyspace::in_memory();
        for i in 0..50 {
            ks.set_string(format!("p{:02}", i).as_bytes(), b"").unwrap();
        }
        let cancel = CancellationToken::new();
        let found = ks.search(b"p", count(7), false, &cancel).unwrap();
        assert_eq!(found.len(), 7);
        assert_eq!(found[0].key, b"p00");
        assert_eq!(found[6].key, b"p06");

        let single = ks.search(b"p", ScanCount::default(), false, &cancel).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_search_no_match_is_empty() {
        let ks = Keyspace::in_memory();
        ks.set_string(b"abc", b"").unwrap();
        let cancel = CancellationToken::new();
        assert!(ks.search(b"b", count(5), false, &cancel).unwrap().is_empty());
        assert!(ks.search(b"abcd", count(5), false, &cancel).unwrap().is_empty());
    }

    #[test]
    fn test_search_with_type() {
        let ks = Keyspace::in_memory();
        ks.set_string(b"k:s", b"").unwrap();
        ks.hset(b"k:h", &[(b"f".to_vec(), b"v".to_vec())]).unwrap();
        let cancel = CancellationToken::new();
        let found = ks.search(b"k:", count(10), true, &cancel).unwrap();
        assert_eq!(found[0].key_type, Some(Some(KeyType::Hash)));
        assert_eq!(found[1].key_type, Some(Some(KeyType::String)));
    }

    #[test]
    fn test_search_rejects_empty_prefix() {
        let ks = Keyspace::in_memory();
        let cancel = CancellationToken::new();
        assert_eq!(ks.search(b"", count(1), false, &cancel), Err(KeyspaceError::EmptyKey));
        assert_eq!(ks.raw_search(b"", count(1), &cancel), Err(KeyspaceError::EmptyKey));
    }

    #[test]
    fn test_raw_search_sentinel_bound() {
        let ks = Keyspace::in_memory();
        for key in ["a", "ab", "b"] {
            ks.set_string(key.as_bytes(), b"").unwrap();
            ks.raw_set(key.as_bytes(), b"").unwrap();
        }
        let cancel = CancellationToken::new();
        let found = ks.raw_search(b"a", count(10), &cancel).unwrap();
        assert_eq!(found, vec![b"a".to_vec(), b"ab".to_vec()]);
    }

    #[test]
    fn test_raw_search_excludes_sentinel_suffixes() {
        let ks = Keyspace::in_memory();
        ks.raw_set(b"a\xfd", b"").unwrap();
        ks.raw_set(b"a\xfe", b"").unwrap();
        ks.raw_set(b"a\xff\x01", b"").unwrap();
        let cancel = CancellationToken::new();
        let found = ks.raw_search(b"a", count(10), &cancel).unwrap();
        assert_eq!(found, vec![b"a\xfd".to_vec()]);
    }

    #[test]
    fn test_raw_search_ignores_user_keys() {
        let ks = Keyspace::in_memory();
        ks.set_string(b"only-user", b"").unwrap();
        let cancel = CancellationToken::new();
        assert!(ks.raw_search(b"only", count(10), &cancel).unwrap().is_empty());
    }
}
