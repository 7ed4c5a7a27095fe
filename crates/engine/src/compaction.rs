//! Compaction: merges every SSTable into a single compacted table.
//!
//! The strategy is single-level and all-at-once: iterate tables newest to
//! oldest into a unified map where the first (newest) write per key wins,
//! drop tombstones, write one `sst_compacted_NNNNNN.dat`, delete the
//! superseded files, and replace the engine's table set. Runs synchronously
//! inside the flush that tripped the trigger.

use anyhow::Result;
use memtable::Snapshot;
use sstable::{bloom_path, SsTable, SsTableWriter};
use tracing::info;

use crate::Engine;

impl Engine {
    pub(crate) fn maybe_compact(&mut self) -> Result<()> {
        if self.sstables.len() >= self.max_sstables {
            self.compact()?;
        }
        Ok(())
    }

    /// Merges all SSTables into one, eliminating superseded entries and
    /// tombstones.
    ///
    /// After compaction the sole remaining table holds exactly the live
    /// keys with their newest values. If nothing is live, no output table
    /// is written and the table set becomes empty.
    pub fn compact(&mut self) -> Result<()> {
        if self.sstables.len() <= 1 {
            return Ok(());
        }

        // Newest first; only the first write per key is kept.
        let mut merged = Snapshot::new();
        for table in self.sstables.iter().rev() {
            for (key, value) in table.entries()? {
                merged.entry(key).or_insert(value);
            }
        }
        merged.retain(|_, value| !value.is_empty());

        let inputs = self.sstables.len();
        let new_table = if merged.is_empty() {
            None
        } else {
            let name = format!("sst_compacted_{:06}.dat", self.next_generation);
            let path = self.data_dir.join(name);
            SsTableWriter::write(&path, &merged)?;
            Some(SsTable::open(&path, self.next_generation)?)
        };

        // The new table is durable; the inputs are now superseded. Drop the
        // readers before unlinking so no handles linger.
        let old = std::mem::take(&mut self.sstables);
        let old_paths: Vec<std::path::PathBuf> =
            old.iter().map(|t| t.path().to_path_buf()).collect();
        drop(old);
        for path in &old_paths {
            drop_table_files(path);
        }

        info!(
            inputs,
            live_entries = merged.len(),
            generation = self.next_generation,
            "compacted sstables"
        );

        self.sstables = new_table.into_iter().collect();
        self.next_generation += 1;

        Ok(())
    }
}

/// Removes a table's data file and filter sidecar, ignoring errors -- a
/// leftover file is re-discovered (and re-compacted) on the next startup.
fn drop_table_files(path: &std::path::Path) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(bloom_path(path));
}
