//! # Engine - SiltKV Storage Engine
//!
//! The central orchestrator that ties together the [`memtable`], [`wal`],
//! and [`sstable`] crates into a complete LSM-tree key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → WAL append → Memtable apply        │
//! │              |                                │
//! │              |  (byte threshold exceeded?)    │
//! │              |            yes                 │
//! │              v                                │
//! │           flush() → new SSTable,              │
//! │                     WAL rotate + truncate     │
//! │              |                                │
//! │              |  (sstable count >= max?)       │
//! │              |            yes                 │
//! │              v                                │
//! │           compact() → single merged SSTable   │
//! │                                               │
//! │ read.rs → Memtable → SSTables newest→oldest   │
//! │            (first match wins, tombstones      │
//! │             mean absent)                      │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                              |
//! |----------------|------------------------------------------------------|
//! | `lib.rs`       | `Config`, `Engine` struct, accessors, `Debug`, `Drop`|
//! | [`recovery`]   | SSTable loading, WAL segment replay                  |
//! | [`write`]      | `put()`, `delete()`, `batch_put()`, `flush()`        |
//! | [`read`]       | `get()`, `read_key_range()`                          |
//! | [`compaction`] | all-at-once merge with tombstone elimination         |
//!
//! ## Crash Safety
//!
//! Every mutation is appended to the WAL and flushed to the OS **before**
//! the memtable update; the ack never races the log. WAL segments are only
//! deleted after a successful flush has persisted (and fsynced) everything
//! they cover into an SSTable. A partially written SSTable is removed before
//! the flush error propagates, so the loader never sees half a table.

mod compaction;
mod read;
mod recovery;
mod write;

use anyhow::Result;
use memtable::Memtable;
use sstable::SsTable;
use std::path::{Path, PathBuf};
use tracing::info;
use wal::Wal;

/// Memtable byte size that triggers a flush (1 MiB).
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1024 * 1024;

/// SSTable count that triggers compaction.
pub const DEFAULT_MAX_SSTABLES: usize = 4;

/// Engine construction options.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding WAL segments and SSTable files.
    pub data_dir: PathBuf,
    /// Memtable byte size (Σ key_len + value_len) that triggers a flush.
    pub flush_threshold: usize,
    /// Number of SSTables that triggers compaction.
    pub max_sstables: usize,
    /// If `true`, every WAL append is followed by fsync.
    pub wal_sync: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            max_sstables: DEFAULT_MAX_SSTABLES,
            wal_sync: false,
        }
    }
}

impl Config {
    /// Default options over the given data directory.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

/// The central storage engine orchestrating memtable, WAL, and SSTables.
///
/// # Write Path
///
/// 1. Append the record to the WAL and flush it to the OS.
/// 2. Apply the mutation to the memtable (deletes store an empty-value
///    tombstone).
/// 3. If the memtable byte accounting has reached the flush threshold,
///    flush it to a new SSTable, rotate the WAL, and delete the superseded
///    segments.
///
/// # Read Path
///
/// 1. Check the memtable (freshest data, includes tombstones).
/// 2. Check SSTables from newest generation to oldest, consulting each
///    table's membership filter first.
/// 3. First match wins; an empty value anywhere means "absent".
///
/// # Recovery
///
/// [`Engine::open`] loads every `sst_*.dat` file in generation order, then
/// replays **all** WAL segments found on disk in ascending id order into a
/// fresh memtable before opening the new active segment.
pub struct Engine {
    pub(crate) mem: Memtable,
    /// All live SSTables, ascending by generation (oldest first). Reads
    /// iterate in reverse.
    pub(crate) sstables: Vec<SsTable>,
    pub(crate) wal: Wal,
    pub(crate) data_dir: PathBuf,
    /// Generation assigned to the next flushed or compacted table; always
    /// one past the highest generation on disk.
    pub(crate) next_generation: u64,
    pub(crate) flush_threshold: usize,
    pub(crate) max_sstables: usize,
}

impl Engine {
    /// Opens (or creates) an engine over `cfg.data_dir`, performing full
    /// recovery.
    ///
    /// # Recovery Steps
    ///
    /// 1. Create the data directory if it does not exist.
    /// 2. Load every SSTable with its filter sidecar and sparse index,
    ///    ordered by generation.
    /// 3. Replay every WAL segment in ascending id order into a fresh
    ///    memtable.
    /// 4. Open a new active WAL segment past the highest existing id.
    pub fn open(cfg: Config) -> Result<Self> {
        std::fs::create_dir_all(&cfg.data_dir)?;

        let sstables = recovery::load_sstables(&cfg.data_dir)?;
        let next_generation = sstables.last().map_or(0, |t| t.generation() + 1);

        let mem = Memtable::new();
        let replayed = recovery::replay_wal_segments(&cfg.data_dir, &mem)?;

        let wal = Wal::open(&cfg.data_dir, cfg.wal_sync)?;

        info!(
            data_dir = %cfg.data_dir.display(),
            sstables = sstables.len(),
            replayed_records = replayed,
            active_segment = wal.segment(),
            "engine opened"
        );

        Ok(Self {
            mem,
            sstables,
            wal,
            data_dir: cfg.data_dir,
            next_generation,
            flush_threshold: cfg.flush_threshold,
            max_sstables: cfg.max_sstables,
        })
    }

    /// Flushes any remaining memtable contents and closes the WAL.
    ///
    /// The first error encountered is returned, but later steps still run
    /// so resources are released either way.
    pub fn close(&mut self) -> Result<()> {
        let mut first_err = None;

        if !self.mem.is_empty() {
            if let Err(e) = self.flush() {
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = self.wal.close() {
            first_err.get_or_insert(e.into());
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of live SSTables.
    #[must_use]
    pub fn sstable_count(&self) -> usize {
        self.sstables.len()
    }

    /// Current memtable byte accounting.
    #[must_use]
    pub fn memtable_bytes(&self) -> usize {
        self.mem.bytes()
    }

    /// Current flush threshold in bytes.
    #[must_use]
    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    /// Updates the flush threshold. Useful for testing or runtime tuning.
    pub fn set_flush_threshold(&mut self, threshold: usize) {
        self.flush_threshold = threshold;
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("data_dir", &self.data_dir)
            .field("memtable_bytes", &self.mem.bytes())
            .field("memtable_entries", &self.mem.len())
            .field("sstable_count", &self.sstables.len())
            .field("next_generation", &self.next_generation)
            .field("flush_threshold", &self.flush_threshold)
            .field("max_sstables", &self.max_sstables)
            .finish()
    }
}

/// Best-effort flush on drop.
///
/// Errors are ignored because `Drop` cannot propagate them -- the data is
/// still covered by the WAL and will be recovered on the next startup.
impl Drop for Engine {
    fn drop(&mut self) {
        if !self.mem.is_empty() {
            let _ = self.flush();
        }
    }
}

#[cfg(test)]
mod tests;
