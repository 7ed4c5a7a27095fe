use super::helpers::{count_sst_files, count_wal_segments, open_engine};
use anyhow::Result;
use std::collections::BTreeMap;
use tempfile::tempdir;

// --------------------- Basic put / get / delete ---------------------

#[test]
fn put_and_get() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    engine.put(b"name".to_vec(), b"alice".to_vec())?;
    assert_eq!(engine.get(b"name")?, Some(b"alice".to_vec()));
    Ok(())
}

#[test]
fn get_missing_key() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_engine(dir.path(), 1024 * 1024);

    assert!(engine.get(b"nope")?.is_none());
    Ok(())
}

#[test]
fn overwrite_key() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    engine.put(b"k".to_vec(), b"v1".to_vec())?;
    engine.put(b"k".to_vec(), b"v2".to_vec())?;
    assert_eq!(engine.get(b"k")?, Some(b"v2".to_vec()));
    Ok(())
}

#[test]
fn delete_removes_key() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    engine.put(b"k".to_vec(), b"v".to_vec())?;
    assert!(engine.get(b"k")?.is_some());

    engine.delete(b"k".to_vec())?;
    assert!(engine.get(b"k")?.is_none());
    Ok(())
}

#[test]
fn delete_then_put_resurrects() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    engine.put(b"k".to_vec(), b"v1".to_vec())?;
    engine.delete(b"k".to_vec())?;
    engine.put(b"k".to_vec(), b"v2".to_vec())?;
    assert_eq!(engine.get(b"k")?, Some(b"v2".to_vec()));
    Ok(())
}

#[test]
fn delete_with_no_prior_put_is_absent() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    engine.delete(b"never".to_vec())?;
    assert!(engine.get(b"never")?.is_none());
    Ok(())
}

// --------------------- Input validation ---------------------

#[test]
fn put_rejects_empty_key() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    let result = engine.put(vec![], b"value".to_vec());
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("empty"));
    Ok(())
}

#[test]
fn delete_rejects_empty_key() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    assert!(engine.delete(vec![]).is_err());
    Ok(())
}

#[test]
fn batch_put_rejects_empty_key_before_writing() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    let mut entries = BTreeMap::new();
    entries.insert(b"good".to_vec(), b"v".to_vec());
    entries.insert(vec![], b"v".to_vec());

    assert!(engine.batch_put(entries).is_err());
    // The whole batch was rejected; nothing was applied.
    assert!(engine.get(b"good")?.is_none());
    Ok(())
}

// --------------------- Batch writes ---------------------

#[test]
fn batch_put_applies_every_entry() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    let mut entries = BTreeMap::new();
    for i in 0..50u64 {
        entries.insert(
            format!("key{:02}", i).into_bytes(),
            format!("val{}", i).into_bytes(),
        );
    }
    engine.batch_put(entries)?;

    for i in 0..50u64 {
        assert_eq!(
            engine.get(format!("key{:02}", i).as_bytes())?,
            Some(format!("val{}", i).into_bytes())
        );
    }
    Ok(())
}

#[test]
fn batch_put_checks_flush_threshold_once_at_end() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 64);

    let mut entries = BTreeMap::new();
    for i in 0..20u64 {
        entries.insert(format!("key{:02}", i).into_bytes(), vec![b'v'; 16]);
    }
    engine.batch_put(entries)?;

    // Well past the threshold, so exactly one flush ran for the batch.
    assert_eq!(count_sst_files(dir.path()), 1);
    for i in 0..20u64 {
        assert!(engine.get(format!("key{:02}", i).as_bytes())?.is_some());
    }
    Ok(())
}

// --------------------- Flush mechanics ---------------------

#[test]
fn flush_triggers_at_threshold() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 4 * 1024);

    let value = vec![b'x'; 512];
    let writes = (4 * 1024 / value.len()) + 5;
    for i in 0..writes {
        engine.put(format!("key{}", i).into_bytes(), value.clone())?;
    }

    assert!(
        count_sst_files(dir.path()) >= 1,
        "expected at least one SSTable after crossing threshold"
    );
    assert!(engine.memtable_bytes() < 4 * 1024);
    Ok(())
}

#[test]
fn flush_rotates_wal_and_removes_old_segments() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1);

    engine.put(b"key1".to_vec(), b"value1".to_vec())?;

    // The flush rotated to a fresh segment and deleted everything older.
    assert_eq!(count_wal_segments(dir.path()), 1);
    assert_eq!(count_sst_files(dir.path()), 1);
    Ok(())
}

#[test]
fn flush_of_empty_memtable_is_noop() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    engine.flush()?;
    assert_eq!(engine.sstable_count(), 0);
    assert_eq!(count_sst_files(dir.path()), 0);
    Ok(())
}

#[test]
fn get_reads_from_sstable_after_flush() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1);

    engine.put(b"k1".to_vec(), b"v1".to_vec())?;
    // After the flush the memtable is empty; k1 lives only in the SSTable.
    assert_eq!(engine.memtable_bytes(), 0);
    assert_eq!(engine.get(b"k1")?, Some(b"v1".to_vec()));
    Ok(())
}

#[test]
fn newest_sstable_wins_on_read() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1);

    engine.put(b"k".to_vec(), b"v1".to_vec())?; // flush -> gen 0
    engine.put(b"k".to_vec(), b"v2".to_vec())?; // flush -> gen 1

    assert_eq!(engine.get(b"k")?, Some(b"v2".to_vec()));
    Ok(())
}

// --------------------- Tombstone shadowing ---------------------

#[test]
fn memtable_tombstone_shadows_sstable_value() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1024 * 1024);

    engine.put(b"k".to_vec(), b"old_value".to_vec())?;
    engine.flush()?;

    // Tombstone lives only in the memtable; the SSTable still has the value.
    engine.delete(b"k".to_vec())?;
    assert!(engine.get(b"k")?.is_none());
    Ok(())
}

#[test]
fn delete_after_flush_with_tiny_threshold() -> Result<()> {
    // Flush on every write: the put lands in one SSTable, the tombstone in
    // the next, and the newer table's tombstone must shadow the older value.
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 2);

    engine.put(b"k".to_vec(), b"v".to_vec())?;
    assert_eq!(engine.sstable_count(), 1);

    engine.delete(b"k".to_vec())?;
    assert!(engine.get(b"k")?.is_none());

    engine.put(b"z".to_vec(), b"z".to_vec())?;
    assert!(engine.sstable_count() >= 2);

    // The tombstone now lives in an SSTable, not the memtable.
    assert!(engine.get(b"k")?.is_none());
    assert_eq!(engine.get(b"z")?, Some(b"z".to_vec()));
    Ok(())
}

// --------------------- Many flushes ---------------------

#[test]
fn multiple_flushes_create_generations_in_order() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_engine(dir.path(), 1);

    for i in 0..3u64 {
        engine.put(format!("k{}", i).into_bytes(), b"v".to_vec())?;
    }

    assert!(dir.path().join("sst_000000.dat").exists());
    assert!(dir.path().join("sst_000001.dat").exists());
    assert!(dir.path().join("sst_000002.dat").exists());
    assert!(dir.path().join("sst_000000.dat.bloom").exists());
    Ok(())
}
