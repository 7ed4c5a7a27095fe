use anyhow::{Context, Result};
use bloom::BloomFilter;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use memtable::Snapshot;

use crate::bloom_path;
use crate::format::{write_record, BLOOM_HASHES, BLOOM_SIZE_BYTES};

pub struct SsTableWriter;

impl SsTableWriter {
    /// Writes a snapshot to `path` as a sorted table, with its membership
    /// filter in the `.bloom` sidecar.
    ///
    /// Entries are emitted in ascending key order (the snapshot iterates
    /// sorted) and every key is fed through the filter. Both the data file
    /// and the sidecar are fsynced before this returns -- only then does the
    /// engine consider the table persisted.
    ///
    /// On any failure the partial data file and sidecar are removed before
    /// the error is returned, so a crash mid-flush never leaves a table the
    /// loader would mistake for a complete one.
    pub fn write(path: &Path, snapshot: &Snapshot) -> Result<()> {
        let result = Self::write_inner(path, snapshot);
        if result.is_err() {
            let _ = fs::remove_file(path);
            let _ = fs::remove_file(bloom_path(path));
        }
        result
    }

    fn write_inner(path: &Path, snapshot: &Snapshot) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create sstable at {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let mut filter = BloomFilter::new(BLOOM_SIZE_BYTES, BLOOM_HASHES);

        for (key, value) in snapshot {
            filter.add(key);
            write_record(&mut writer, key, value)?;
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;

        filter
            .save(bloom_path(path))
            .context("failed to write bloom sidecar")?;

        Ok(())
    }
}
