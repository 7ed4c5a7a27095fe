use anyhow::{Context, Result};
use bloom::BloomFilter;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use crate::bloom_path;
use crate::format::{is_malformed_framing, read_record, record_len, INDEX_INTERVAL};

/// A readable sorted table: the data file, its sparse index, and its
/// membership filter.
///
/// On [`open`](SsTable::open) the `.bloom` sidecar is loaded (an unreadable
/// sidecar leaves the table filterless -- probes then fall through to the
/// index and data scan) and the sparse index is built by streaming the data
/// file: every 128th record contributes a `(key, byte offset)` pair. The
/// same streaming procedure runs right after a flush writes the file and
/// again at every startup.
///
/// A persistent file handle is kept open for the table's lifetime, wrapped
/// in a `Mutex` so lookups work through a shared `&self`.
pub struct SsTable {
    path: PathBuf,
    /// Origin generation; higher means newer, newer shadows older.
    generation: u64,
    /// Sparse index: every 128th record's key and start offset, ascending.
    index: Vec<(Vec<u8>, u64)>,
    /// `None` when the sidecar was missing or unreadable.
    filter: Option<BloomFilter>,
    file: Mutex<BufReader<File>>,
}

impl SsTable {
    /// Opens the table at `path`, loading the filter sidecar and building
    /// the sparse index.
    pub fn open(path: &Path, generation: u64) -> Result<Self> {
        let filter = match BloomFilter::load(bloom_path(path)) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!(
                    table = %path.display(),
                    error = %e,
                    "unreadable bloom sidecar, lookups fall through to data scan"
                );
                None
            }
        };

        let file = File::open(path)
            .with_context(|| format!("failed to open sstable at {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let index = Self::build_index(&mut reader)?;

        Ok(Self {
            path: path.to_path_buf(),
            generation,
            index,
            filter,
            file: Mutex::new(reader),
        })
    }

    /// Streams the whole file, sampling every 128th record into the index.
    fn build_index(reader: &mut BufReader<File>) -> Result<Vec<(Vec<u8>, u64)>> {
        reader.seek(SeekFrom::Start(0))?;
        let mut index = Vec::new();
        let mut offset = 0u64;
        let mut count = 0usize;

        loop {
            let (key, value) = match read_record(reader) {
                Ok(Some(rec)) => rec,
                Ok(None) => break,
                // A truncated tail ends the table early; everything decoded
                // so far stays usable.
                Err(e) if is_malformed_framing(&e) => break,
                Err(e) => return Err(e),
            };
            if count % INDEX_INTERVAL == 0 {
                index.push((key.clone(), offset));
            }
            offset += record_len(key.len(), value.len());
            count += 1;
        }

        Ok(index)
    }

    /// The generation number this table was written under.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Path of the data file on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` if a membership filter is loaded.
    #[must_use]
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Number of sparse index entries (not the record count).
    #[must_use]
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Point lookup.
    ///
    /// If the membership filter rejects the key this returns absent without
    /// touching disk. Otherwise the sparse index gives the offset of the
    /// largest indexed key `<=` the target, and records are scanned forward
    /// from there until the target is found or a greater key proves it
    /// absent.
    ///
    /// The value is returned verbatim -- an empty value is a tombstone the
    /// engine interprets.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(ref filter) = self.filter {
            if !filter.might_contain(key) {
                return Ok(None);
            }
        }

        let offset = match self.seek_offset(key) {
            Some(o) => o,
            // Below the smallest key in the table (or the table is empty).
            None => return Ok(None),
        };

        let mut file = self.lock_file();
        file.seek(SeekFrom::Start(offset))?;

        loop {
            match read_record(&mut *file)? {
                Some((k, v)) => {
                    if k == key {
                        return Ok(Some(v));
                    }
                    if k.as_slice() > key {
                        return Ok(None);
                    }
                }
                None => return Ok(None),
            }
        }
    }

    /// All entries with `start <= key <= end`, tombstones included.
    ///
    /// Seeks via the sparse index, then scans forward and stops as soon as a
    /// key exceeds `end`. Malformed framing ends the scan like end-of-file.
    pub fn range(&self, start: &[u8], end: &[u8]) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        let offset = self.seek_offset(start).unwrap_or(0);

        let mut file = self.lock_file();
        file.seek(SeekFrom::Start(offset))?;

        let mut result = BTreeMap::new();
        loop {
            let (k, v) = match read_record(&mut *file) {
                Ok(Some(rec)) => rec,
                Ok(None) => break,
                Err(e) if is_malformed_framing(&e) => break,
                Err(e) => return Err(e),
            };
            if k.as_slice() > end {
                break;
            }
            if k.as_slice() >= start {
                result.insert(k, v);
            }
        }

        Ok(result)
    }

    /// Every entry in the table in ascending key order, tombstones included.
    /// Compaction consumes this.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut file = self.lock_file();
        file.seek(SeekFrom::Start(0))?;

        let mut result = Vec::new();
        loop {
            match read_record(&mut *file) {
                Ok(Some(rec)) => result.push(rec),
                Ok(None) => break,
                Err(e) if is_malformed_framing(&e) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }

    /// Offset of the largest indexed key `<=` `key`, or `None` if `key`
    /// sorts before every indexed key.
    fn seek_offset(&self, key: &[u8]) -> Option<u64> {
        let idx = self.index.partition_point(|(k, _)| k.as_slice() <= key);
        if idx == 0 {
            return None;
        }
        Some(self.index[idx - 1].1)
    }

    fn lock_file(&self) -> std::sync::MutexGuard<'_, BufReader<File>> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsTable")
            .field("path", &self.path)
            .field("generation", &self.generation)
            .field("index_entries", &self.index.len())
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
