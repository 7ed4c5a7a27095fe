//! Read path: `get()` and `read_key_range()`.
//!
//! Point lookups check the memtable first, then SSTables from newest
//! generation to oldest, short-circuiting on the first hit -- including a
//! tombstone hit, which means "absent". Range reads union every tier with
//! newest-wins merging, then strip tombstones.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::Engine;

impl Engine {
    /// Looks up a key, returning `None` if it is absent or deleted.
    ///
    /// An empty value in any tier is a tombstone: the search stops there and
    /// the key is reported absent, shadowing older tables. Each SSTable's
    /// membership filter is consulted before its index and data file.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.mem.get(key) {
            return Ok(live_value(value));
        }

        for table in self.sstables.iter().rev() {
            if let Some(value) = table.get(key)? {
                return Ok(live_value(value));
            }
        }

        Ok(None)
    }

    /// Returns every live entry with `start <= key <= end`, inclusive on
    /// both ends.
    ///
    /// The memtable is collected first, then each SSTable newest to oldest;
    /// a key already present in the result is never overwritten, so the
    /// newest write wins. Tombstones survive the merge (they must shadow
    /// older tables) and are stripped at the end.
    pub fn read_key_range(
        &self,
        start: &[u8],
        end: &[u8],
    ) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        let mut result = self.mem.range(start, end);

        for table in self.sstables.iter().rev() {
            for (key, value) in table.range(start, end)? {
                result.entry(key).or_insert(value);
            }
        }

        result.retain(|_, value| !value.is_empty());
        Ok(result)
    }
}

/// Maps the tombstone encoding to "absent".
fn live_value(value: Vec<u8>) -> Option<Vec<u8>> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
