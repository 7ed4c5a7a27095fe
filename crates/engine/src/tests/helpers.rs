use crate::{Config, Engine};
use std::fs;
use std::path::Path;

/// Opens an engine over `dir` with the given flush threshold and the default
/// compaction trigger.
pub fn open_engine(dir: &Path, flush_threshold: usize) -> Engine {
    Engine::open(Config {
        flush_threshold,
        ..Config::new(dir)
    })
    .unwrap()
}

/// Opens an engine with both thresholds pinned.
pub fn open_engine_with_max(dir: &Path, flush_threshold: usize, max_sstables: usize) -> Engine {
    Engine::open(Config {
        flush_threshold,
        max_sstables,
        ..Config::new(dir)
    })
    .unwrap()
}

/// Number of `sst_*.dat` data files in `dir` (sidecars excluded).
pub fn count_sst_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "dat")
                .unwrap_or(false)
        })
        .count()
}

/// Number of `wal_*.log` segment files in `dir`.
pub fn count_wal_segments(dir: &Path) -> usize {
    wal::list_segments(dir).unwrap().len()
}
