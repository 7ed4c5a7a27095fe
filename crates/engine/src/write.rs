//! Write path: `put()`, `delete()`, `batch_put()`, and the flush pipeline.
//!
//! All mutations flow through this module. Each write is appended to the WAL
//! for durability before touching the memtable; if the WAL append fails the
//! memtable stays unmodified and nothing is acknowledged.

use anyhow::{ensure, Result};
use memtable::{Memtable, Snapshot};
use sstable::{SsTable, SsTableWriter};
use std::collections::BTreeMap;
use tracing::info;
use wal::WalRecord;

use crate::Engine;

impl Engine {
    /// Inserts a key-value pair.
    ///
    /// The record is appended to the WAL and flushed to the OS before the
    /// memtable is touched. Crossing the flush threshold triggers the flush
    /// pipeline synchronously.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        ensure!(!key.is_empty(), "key must not be empty");

        self.wal.append(&WalRecord::Put {
            key: key.clone(),
            value: value.clone(),
        })?;
        self.mem.put(key, value);

        self.maybe_flush()
    }

    /// Deletes a key by writing a tombstone.
    ///
    /// The tombstone (an empty value) lands in the WAL and the memtable and
    /// shadows any older value in the SSTables until compaction drops it.
    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        ensure!(!key.is_empty(), "key must not be empty");

        self.wal.append(&WalRecord::Delete { key: key.clone() })?;
        self.mem.delete(key);

        self.maybe_flush()
    }

    /// Inserts a group of entries with a single WAL flush.
    ///
    /// All records are framed under one WAL lock acquisition and flushed
    /// once -- the amortization batches exist for. Every key is validated
    /// before the first byte reaches the log, so a bad batch is rejected
    /// whole. Ordering within the batch is unspecified.
    pub fn batch_put(&mut self, entries: BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
        ensure!(
            entries.keys().all(|k| !k.is_empty()),
            "batch contains an empty key"
        );

        let records: Vec<WalRecord> = entries
            .iter()
            .map(|(key, value)| WalRecord::Put {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        self.wal.append_batch(&records)?;

        for (key, value) in entries {
            self.mem.put(key, value);
        }

        self.maybe_flush()
    }

    fn maybe_flush(&mut self) -> Result<()> {
        if self.mem.bytes() >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Flushes the memtable to a new SSTable. No-op when the memtable is
    /// empty.
    ///
    /// # Steps
    ///
    /// 1. Snapshot the memtable.
    /// 2. Write `sst_NNNNNN.dat` (and its filter sidecar) under the next
    ///    generation; a failed write removes the partial file and aborts.
    /// 3. Adopt the new table and bump the generation counter.
    /// 4. Replace the memtable with a fresh empty one.
    /// 5. Rotate the WAL onto a new segment.
    /// 6. Delete WAL segments strictly older than the new active one.
    /// 7. Run the compaction check.
    ///
    /// The order matters: a crash between any two steps leaves the WAL
    /// covering every write not yet persisted in an SSTable.
    pub fn flush(&mut self) -> Result<()> {
        let snapshot = self.mem.snapshot();
        if snapshot.is_empty() {
            return Ok(());
        }

        let table = self.write_sstable(&snapshot)?;
        info!(
            generation = table.generation(),
            entries = snapshot.len(),
            "flushed memtable to sstable"
        );

        self.sstables.push(table);
        self.next_generation += 1;

        self.mem = Memtable::new();

        self.wal.rotate()?;
        self.wal.truncate_before(self.wal.segment())?;

        self.maybe_compact()
    }

    fn write_sstable(&self, snapshot: &Snapshot) -> Result<SsTable> {
        let name = format!("sst_{:06}.dat", self.next_generation);
        let path = self.data_dir.join(name);
        SsTableWriter::write(&path, snapshot)?;
        SsTable::open(&path, self.next_generation)
    }
}
