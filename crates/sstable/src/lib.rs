//! # SSTable - Sorted String Table
//!
//! Immutable, on-disk storage files for the SiltKV storage engine.
//!
//! When the in-memory memtable exceeds its size threshold the engine flushes
//! a snapshot of it to disk as an SSTable. SSTables are *write-once,
//! read-many* -- once created they are never modified, only replaced during
//! compaction.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │ sst_NNNNNN.dat                                        │
//! │                                                       │
//! │ key_len (u32 BE) | key | value_len (u32 BE) | value   │
//! │ ... repeated, ascending key order, no separator ...   │
//! ├───────────────────────────────────────────────────────┤
//! │ sst_NNNNNN.dat.bloom (sidecar)                        │
//! │                                                       │
//! │ serialized membership filter (see the bloom crate)    │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! An empty value is a tombstone. The data file carries no footer and no
//! version marker; framing is implicit in the length prefixes.
//!
//! ## Sparse index
//!
//! Instead of indexing every record, every 128th record contributes a
//! `(key, byte offset)` pair to an in-memory vector built by streaming the
//! file -- the same procedure whether the table was just written or is being
//! loaded at startup. A point lookup binary-searches the vector for the
//! largest indexed key `<=` the target, seeks there, and scans at most 128
//! records forward.

mod format;
mod reader;
mod writer;

pub use format::{BLOOM_HASHES, BLOOM_SIZE_BYTES, INDEX_INTERVAL};
pub use reader::SsTable;
pub use writer::SsTableWriter;

use std::path::{Path, PathBuf};

/// Path of the membership-filter sidecar for a data file.
pub fn bloom_path(data_path: &Path) -> PathBuf {
    let mut name = data_path.as_os_str().to_os_string();
    name.push(".bloom");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests;
