//! Cold-start recovery: SSTable discovery and WAL segment replay.

use anyhow::{Context, Result};
use memtable::Memtable;
use sstable::SsTable;
use std::path::Path;
use tracing::info;
use wal::{WalReader, WalRecord};

/// Discovers every `sst_*.dat` file under `data_dir` and opens each one,
/// returning them sorted ascending by generation.
///
/// Generation numbers are parsed out of both name forms (`sst_NNNNNN.dat`
/// from flushes, `sst_compacted_NNNNNN.dat` from compaction) and the sort is
/// numeric: a compacted table sorts lexically after later flush outputs but
/// is older than them, so filename order alone would invert recency.
pub(crate) fn load_sstables(data_dir: &Path) -> Result<Vec<SsTable>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let path = entry?.path();
        if let Some(generation) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_generation)
        {
            found.push((generation, path));
        }
    }
    found.sort_by_key(|(generation, _)| *generation);

    let mut sstables = Vec::with_capacity(found.len());
    for (generation, path) in found {
        let table = SsTable::open(&path, generation)
            .with_context(|| format!("failed to load sstable {}", path.display()))?;
        sstables.push(table);
    }
    Ok(sstables)
}

/// Extracts the generation from an SSTable data filename.
///
/// `sst_000007.dat` -> 7, `sst_compacted_000004.dat` -> 4. Sidecars and
/// unrelated files yield `None`.
pub(crate) fn parse_generation(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(".dat")?;
    let id = stem
        .strip_prefix("sst_compacted_")
        .or_else(|| stem.strip_prefix("sst_"))?;
    id.parse().ok()
}

/// Replays every WAL segment under `data_dir` in ascending id order into
/// `mem`, returning the number of records applied.
///
/// PUTs call `put`, DELETEs call `delete` (recording a tombstone). A
/// truncated trailing record in any segment is tolerated; corruption
/// mid-stream aborts recovery.
pub(crate) fn replay_wal_segments(data_dir: &Path, mem: &Memtable) -> Result<usize> {
    let mut replayed = 0usize;

    for (id, path) in wal::list_segments(data_dir)? {
        let mut reader = WalReader::open(&path)
            .with_context(|| format!("failed to open wal segment {}", path.display()))?;
        let mut in_segment = 0usize;
        reader
            .replay(|record| {
                match record {
                    WalRecord::Put { key, value } => mem.put(key, value),
                    WalRecord::Delete { key } => mem.delete(key),
                }
                in_segment += 1;
            })
            .with_context(|| format!("failed to replay wal segment {}", path.display()))?;

        info!(segment = id, records = in_segment, "replayed wal segment");
        replayed += in_segment;
    }

    Ok(replayed)
}
