//! Cursor enumeration over the user namespace
//!
//! Pagination is seek based: the caller passes the key to start from
//! (inclusive) and resumes by passing the last key it saw.

use crate::error::Result;
use crate::keyspace::{encode, region_end, Keyspace, USER_REGION};
use crate::types::{Direction, KeyEntry, ScanCount, Visit};
use std::ops::Bound;
use tokio_util::sync::CancellationToken;

/// Parameters for one enumeration call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumerateOptions {
    pub direction: Direction,
    pub count: ScanCount,
    with_type: bool,
    with_value: bool,
}

impl EnumerateOptions {
    pub fn new(direction: Direction, count: ScanCount) -> Self {
        Self {
            direction,
            count,
            with_type: false,
            with_value: false,
        }
    }

    pub fn with_type(mut self, enabled: bool) -> Self {
        self.with_type = enabled;
        self
    }

    /// Only honoured together with [`with_type`](Self::with_type)
    pub fn with_value(mut self, enabled: bool) -> Self {
        self.with_value = enabled;
        self
    }

    pub fn emits_type(&self) -> bool {
        self.with_type
    }

    pub fn emits_value(&self) -> bool {
        self.with_type && self.with_value
    }
}

impl Keyspace {
    /// Visit user keys from `seek` (inclusive) in `direction`
    ///
    /// The visitor receives each key and its value and decides whether to
    /// continue. Keys come back without their region prefix.
    pub fn visit_keys(
        &self,
        seek: &[u8],
        direction: Direction,
        cancel: &CancellationToken,
        visit: impl FnMut(&[u8], &[u8]) -> Visit,
    ) -> Result<()> {
        let start = encode(USER_REGION, seek);
        let end = region_end(USER_REGION);
        let region_start = [USER_REGION];
        let (lower, upper) = match direction {
            Direction::Forward => (Bound::Included(&start[..]), Bound::Excluded(&end[..])),
            Direction::Backward => (Bound::Included(&region_start[..]), Bound::Included(&start[..])),
        };
        self.scan_region(lower, upper, direction, cancel, visit)
    }

    /// Collect up to `options.count` user keys starting at `seek`
    ///
    /// Type tags are looked up after the scan, one point read per key.
    pub fn enumerate(
        &self,
        seek: &[u8],
        options: EnumerateOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<KeyEntry>> {
        let limit = options.count.get();
        let want_value = options.emits_value();
        let mut found: Vec<(Vec<u8>, Option<Vec<u8>>)> = Vec::with_capacity(limit.min(1024));

        self.visit_keys(seek, options.direction, cancel, |key, value| {
            found.push((key.to_vec(), want_value.then(|| value.to_vec())));
            if found.len() >= limit {
                Visit::Stop
            } else {
                Visit::Continue
            }
        })?;

        found
            .into_iter()
            .map(|(key, value)| -> Result<KeyEntry> {
                let key_type = if options.emits_type() {
                    Some(self.type_of(&key)?)
                } else {
                    None
                };
                Ok(KeyEntry { key, key_type, value })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyType;

    fn seeded() -> Keyspace {
        let ks = Keyspace::in_memory();
        for key in ["a", "ab", "b", "c", "d"] {
            ks.set_string(key.as_bytes(), format!("v-{}", key).as_bytes()).unwrap();
        }
        ks.raw_set(b"zz-raw", b"hidden").unwrap();
        ks
    }

    fn keys(entries: &[KeyEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| String::from_utf8_lossy(&e.key).into_owned())
            .collect()
    }

    fn opts(direction: Direction, count: i64) -> EnumerateOptions {
        EnumerateOptions::new(direction, ScanCount::new(count).unwrap())
    }

    #[test]
    fn test_forward_from_seek() {
        let ks = seeded();
        let cancel = CancellationToken::new();
        let entries = ks.enumerate(b"ab", opts(Direction::Forward, 3), &cancel).unwrap();
        assert_eq!(keys(&entries), vec!["ab", "b", "c"]);
        assert!(entries.iter().all(|e| e.key_type.is_none() && e.value.is_none()));
    }

    #[test]
    fn test_forward_seek_between_keys() {
        let ks = seeded();
        let cancel = CancellationToken::new();
        let entries = ks.enumerate(b"aa", opts(Direction::Forward, 10), &cancel).unwrap();
        assert_eq!(keys(&entries), vec!["ab", "b", "c", "d"]);
    }

    #[test]
    fn test_backward_from_seek() {
        let ks = seeded();
        let cancel = CancellationToken::new();
        let entries = ks.enumerate(b"bz", opts(Direction::Backward, 10), &cancel).unwrap();
        assert_eq!(keys(&entries), vec!["b", "ab", "a"]);
    }

    #[test]
    fn test_exhausted_namespace_is_empty() {
        let ks = seeded();
        let cancel = CancellationToken::new();
        assert!(ks.enumerate(b"e", opts(Direction::Forward, 5), &cancel).unwrap().is_empty());
        assert!(ks.enumerate(b"0", opts(Direction::Backward, 5), &cancel).unwrap().is_empty());
    }

    #[test]
    fn test_raw_entries_are_not_enumerated() {
        let ks = seeded();
        let cancel = CancellationToken::new();
        let entries = ks.enumerate(b"", opts(Direction::Forward, 100), &cancel).unwrap();
        assert_eq!(entries.len(), 5);
        assert!(entries.iter().all(|e| e.key != b"zz-raw"));
    }

    #[test]
    fn test_with_type_and_value() {
        let ks = seeded();
        ks.hset(b"bh", &[(b"f".to_vec(), b"1".to_vec())]).unwrap();
        let cancel = CancellationToken::new();
        let options = opts(Direction::Forward, 2).with_type(true).with_value(true);
        let entries = ks.enumerate(b"b", options, &cancel).unwrap();

        assert_eq!(entries[0].key, b"b");
        assert_eq!(entries[0].key_type, Some(Some(KeyType::String)));
        assert_eq!(entries[0].value, Some(b"v-b".to_vec()));
        assert_eq!(entries[1].key, b"bh");
        assert_eq!(entries[1].key_type, Some(Some(KeyType::Hash)));
    }

    #[test]
    fn test_value_requires_type() {
        let ks = seeded();
        let cancel = CancellationToken::new();
        let options = opts(Direction::Forward, 5).with_value(true);
        assert!(!options.emits_value());
        let entries = ks.enumerate(b"a", options, &cancel).unwrap();
        assert!(entries.iter().all(|e| e.value.is_none()));
    }

    #[test]
    fn test_pagination_by_resuming_after_last_key() {
        let ks = seeded();
        let cancel = CancellationToken::new();
        let mut seek = Vec::new();
        let mut all = Vec::new();
        loop {
            let page = ks.enumerate(&seek, opts(Direction::Forward, 2), &cancel).unwrap();
            let fresh: Vec<_> = page.into_iter().filter(|e| e.key != seek).collect();
            if fresh.is_empty() {
                break;
            }
            seek = fresh.last().unwrap().key.clone();
            all.extend(fresh.into_iter().map(|e| e.key));
        }
        assert_eq!(all, vec![b"a".to_vec(), b"ab".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn test_ordering_and_bounds_hold_for_every_count() {
        let ks = Keyspace::in_memory();
        for i in 0..200u32 {
            ks.set_string(format!("key:{:05}", i * 7 % 1000).as_bytes(), b"").unwrap();
        }
        let cancel = CancellationToken::new();
        for count in [1, 2, 17, 200, 10_000] {
            let fwd = ks.enumerate(b"key:00500", opts(Direction::Forward, count), &cancel).unwrap();
            assert!(fwd.len() <= count as usize);
            assert!(fwd.iter().all(|e| e.key.as_slice() >= &b"key:00500"[..]));
            assert!(fwd.windows(2).all(|w| w[0].key < w[1].key));

            let back = ks.enumerate(b"key:00500", opts(Direction::Backward, count), &cancel).unwrap();
            assert!(back.len() <= count as usize);
            assert!(back.iter().all(|e| e.key.as_slice() <= &b"key:00500"[..]));
            assert!(back.windows(2).all(|w| w[0].key > w[1].key));
        }
    }
}
