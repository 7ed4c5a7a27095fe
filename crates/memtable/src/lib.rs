use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{PoisonError, RwLock};

/// The sorted view a flush operates on, fully decoupled from later mutations.
///
/// Empty values are tombstones; the sstable writer persists them as-is so
/// they keep shadowing older tables.
pub type Snapshot = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory mutable table of the most recent writes and tombstones.
///
/// A tombstone is stored as an **empty value** under the key. `delete` never
/// removes the key from the map: a delete issued after the key was flushed to
/// a sorted table must leave a marker behind, or the next `get` would find
/// the stale on-disk value.
///
/// `bytes` tracks Σ(key_len + value_len) over all present entries, the
/// number the engine compares against its flush threshold.
///
/// All fields sit behind a reader/writer lock: `put`/`delete` take the
/// writer side, everything else the reader side. A poisoned lock is
/// recovered with [`PoisonError::into_inner`] -- the guarded data is a plain
/// map and stays structurally valid across panics.
#[derive(Debug, Default)]
pub struct Memtable {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    bytes: usize,
}

impl Memtable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `key` to `value`, replacing any existing mapping.
    ///
    /// The key-length contribution to the byte accounting is constant across
    /// overwrites; only the value delta is applied.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.map.get(&key).map(Vec::len) {
            Some(old_len) => inner.bytes = inner.bytes - old_len + value.len(),
            None => inner.bytes += key.len() + value.len(),
        }
        inner.map.insert(key, value);
    }

    /// Records a tombstone for `key` by storing the empty value.
    pub fn delete(&self, key: Vec<u8>) {
        self.put(key, Vec::new());
    }

    /// Returns the mapped value, or `None` if the key has never been written.
    ///
    /// A tombstone comes back as `Some` of the empty vector; the engine layer
    /// is the one that interprets it as "absent".
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .get(key)
            .cloned()
    }

    /// Current Σ(key_len + value_len) across all present entries.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bytes
    }

    /// Number of entries, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An independent sorted copy, decoupled from subsequent mutations.
    pub fn snapshot(&self) -> Snapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .clone()
    }

    /// All entries with `start <= key <= end`, tombstones included. An
    /// inverted range matches nothing.
    pub fn range(&self, start: &[u8], end: &[u8]) -> BTreeMap<Vec<u8>, Vec<u8>> {
        if start > end {
            return BTreeMap::new();
        }
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .map
            .range::<[u8], _>((Bound::Included(start), Bound::Included(end)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
