//! Core value types of the tree: entries, index pointers, roots and spans.

use serde::{Deserialize, Serialize};

use crate::common::{Hash, Key, Value};
use crate::error::{PtreeError, Result};

/// One key/value pair, the atomic unit of the tree's logical content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Value,
}

impl Entry {
    pub fn new(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Entry {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A pointer to a child chunk plus the smallest key reachable through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub first: Key,
    pub hash: Hash,
}

impl Index {
    /// An Index is stored at the parent level as an ordinary Entry:
    /// key = first, value = the raw hash bytes.
    pub fn into_entry(self) -> Entry {
        Entry {
            key: self.first,
            value: self.hash.to_vec(),
        }
    }

    pub fn from_entry(ent: &Entry) -> Result<Self> {
        let hash: Hash = ent.value.as_slice().try_into().map_err(|_| {
            PtreeError::Corrupt(format!(
                "index entry value must be {} bytes, got {}",
                std::mem::size_of::<Hash>(),
                ent.value.len()
            ))
        })?;
        Ok(Index {
            first: ent.key.clone(),
            hash,
        })
    }
}

/// Entry point to a persistent tree. Depth 0 means `hash` refers to a chunk
/// of data entries; depth N > 0 means a chunk of index entries referencing
/// depth N-1 subtrees. Roots are immutable; every write operation yields a
/// new Root sharing unchanged chunks with the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub hash: Hash,
    pub depth: u8,
}

/// Returns the immediate successor of `key` in the keyspace: `key` plus a
/// zero byte. `[k, key_after(k))` is the span containing exactly `k`.
pub fn key_after(key: &[u8]) -> Key {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.extend_from_slice(key);
    out.push(0);
    out
}

/// The smallest key greater than every key beginning with `prefix`, or None
/// when no such key exists (prefix is empty or all 0xFF).
pub fn prefix_end(prefix: &[u8]) -> Option<Key> {
    for i in (0..prefix.len()).rev() {
        if prefix[i] < 0xff {
            let mut out = prefix[..=i].to_vec();
            out[i] += 1;
            return Some(out);
        }
    }
    None
}

/// A half-open key range `[first, last)`. `None` on either side means
/// unbounded in that direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    pub first: Option<Key>,
    pub last: Option<Key>,
}

impl Span {
    /// The span covering the entire keyspace.
    pub fn total() -> Self {
        Span::default()
    }

    /// The span containing exactly `key`.
    pub fn single(key: &[u8]) -> Self {
        Span {
            first: Some(key.to_vec()),
            last: Some(key_after(key)),
        }
    }

    /// All keys beginning with `prefix`.
    pub fn prefix(prefix: &[u8]) -> Self {
        Span {
            first: Some(prefix.to_vec()),
            last: prefix_end(prefix),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        if let Some(first) = &self.first {
            if key < first.as_slice() {
                return false;
            }
        }
        if let Some(last) = &self.last {
            if key >= last.as_slice() {
                return false;
            }
        }
        true
    }

    /// True when every key in the span is < `key`.
    pub fn all_less_than(&self, key: &[u8]) -> bool {
        match &self.last {
            Some(last) => last.as_slice() <= key,
            None => false,
        }
    }

    /// True when every key in the span is > `key`.
    pub fn all_greater_than(&self, key: &[u8]) -> bool {
        match &self.first {
            Some(first) => key < first.as_slice(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_after_is_immediate_successor() {
        assert_eq!(key_after(b"abc"), b"abc\x00".to_vec());
        assert!(b"abc".as_slice() < key_after(b"abc").as_slice());
        assert!(key_after(b"abc").as_slice() < b"abd".as_slice());
    }

    #[test]
    fn single_span_contains_only_its_key() {
        let s = Span::single(b"k5");
        assert!(s.contains(b"k5"));
        assert!(!s.contains(b"k4"));
        assert!(!s.contains(b"k5\x00"));
        assert!(!s.contains(b"k6"));
    }

    #[test]
    fn total_span_contains_everything() {
        let s = Span::total();
        assert!(s.contains(b""));
        assert!(s.contains(&[0xff; 64]));
    }

    #[test]
    fn prefix_span() {
        let s = Span::prefix(b"dir/");
        assert!(s.contains(b"dir/"));
        assert!(s.contains(b"dir/a"));
        assert!(s.contains(b"dir/\xff\xff"));
        assert!(!s.contains(b"dir0"));
        assert!(!s.contains(b"dia"));

        // All-0xFF prefixes have no upper bound.
        let s = Span::prefix(&[0xff, 0xff]);
        assert_eq!(s.last, None);
        assert!(s.contains(&[0xff, 0xff, 0x01]));
    }

    #[test]
    fn span_ordering_helpers() {
        let s = Span {
            first: Some(b"b".to_vec()),
            last: Some(b"d".to_vec()),
        };
        assert!(s.all_less_than(b"d"));
        assert!(s.all_less_than(b"e"));
        assert!(!s.all_less_than(b"c"));
        assert!(s.all_greater_than(b"a"));
        assert!(!s.all_greater_than(b"b"));
    }

    #[test]
    fn index_entry_round_trip() {
        let idx = Index {
            first: b"k".to_vec(),
            hash: [7u8; 32],
        };
        let ent = idx.clone().into_entry();
        assert_eq!(Index::from_entry(&ent).unwrap(), idx);

        let bad = Entry::new(b"k".to_vec(), b"short".to_vec());
        assert!(Index::from_entry(&bad).is_err());
    }

    #[test]
    fn root_serializes_for_embedding() {
        let root = Root {
            hash: [3u8; 32],
            depth: 2,
        };
        let js = serde_json::to_string(&root).unwrap();
        let back: Root = serde_json::from_str(&js).unwrap();
        assert_eq!(back, root);
    }
}
