//! # WAL - Write-Ahead Log
//!
//! Provides crash-safe durability for the SiltKV storage engine.
//!
//! Every mutation (`PUT` or `DELETE`) is serialized into a binary record and
//! appended to the WAL **before** the corresponding in-memory update. On
//! restart every segment found on disk is replayed in ascending id order to
//! reconstruct the memtable, guaranteeing that no acknowledged write is lost.
//!
//! ## Binary Record Format
//!
//! ```text
//! [type: u8][key_len: u32 BE][key][value_len: u32 BE][value]
//! ```
//!
//! `type` is 1 for PUT, 2 for DELETE. A DELETE record carries
//! `value_len = 0`.
//!
//! ## Segmentation
//!
//! The log lives in a directory of files named `wal_NNNNNN.log` with strictly
//! increasing segment ids. Exactly one segment -- the highest-numbered -- is
//! open for appending; the rest are closed and read-only until
//! [`Wal::truncate_before`] deletes them. Every startup opens a **new**
//! segment at `max(id) + 1`, so a segment is never appended to twice across
//! process lifetimes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::{Wal, WalReader, WalRecord};
//!
//! let wal = Wal::open("data", false).unwrap();
//! wal.append(&WalRecord::Put {
//!     key: b"hello".to_vec(),
//!     value: b"world".to_vec(),
//! }).unwrap();
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Record type marker for PUT.
const RECORD_PUT: u8 = 1;
/// Record type marker for DELETE.
const RECORD_DELETE: u8 = 2;

/// Replay rejects key/value length prefixes above these caps before
/// allocating; a corrupt prefix would otherwise request gigabytes.
const MAX_KEY_LEN: u32 = 64 * 1024 * 1024;
const MAX_VALUE_LEN: u32 = 256 * 1024 * 1024;

/// A single WAL record representing either a key-value insertion or a
/// deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// A key-value insertion.
    Put {
        /// The lookup key.
        key: Vec<u8>,
        /// The payload value.
        value: Vec<u8>,
    },
    /// A key deletion (tombstone).
    Delete {
        /// The key to delete.
        key: Vec<u8>,
    },
}

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record contained an unknown type byte or an implausible length
    /// prefix.
    #[error("corrupt wal record")]
    Corrupt,
}

/// State guarded by the WAL's single mutex: writer, file handle (owned by
/// the writer), and segment id.
struct WalInner {
    writer: BufWriter<File>,
    segment: u64,
}

/// The segmented write-ahead log.
///
/// One mutex serializes append, batch append, rotate, and close. The lock is
/// held across the framed write *and* the flush of a single append, and
/// across all records plus the single flush of a batch append -- that single
/// flush is the amortization batches exist for.
pub struct Wal {
    dir: PathBuf,
    sync: bool,
    inner: Mutex<WalInner>,
}

impl Wal {
    /// Opens the log directory, creating it if needed, and starts a fresh
    /// active segment.
    ///
    /// If the directory holds no segments the active segment is 0; otherwise
    /// it is one past the highest id found. Pre-existing segments are left
    /// untouched -- the engine replays them (see [`list_segments`] and
    /// [`WalReader`]) before calling this.
    ///
    /// `sync` adds an fsync after the user-space flush of every append.
    pub fn open<P: AsRef<Path>>(dir: P, sync: bool) -> Result<Self, WalError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let segment = match list_segments(&dir)?.last() {
            Some((id, _)) => id + 1,
            None => 0,
        };
        let writer = Self::open_segment(&dir, segment)?;

        Ok(Self {
            dir,
            sync,
            inner: Mutex::new(WalInner { writer, segment }),
        })
    }

    fn open_segment(dir: &Path, id: u64) -> Result<BufWriter<File>, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(segment_path(dir, id))?;
        Ok(BufWriter::new(file))
    }

    /// Appends a single record and flushes it to the OS before returning.
    pub fn append(&self, record: &WalRecord) -> Result<(), WalError> {
        let mut inner = self.lock();
        write_record(&mut inner.writer, record)?;
        self.flush_writer(&mut inner.writer)
    }

    /// Appends every record under one lock acquisition and one flush.
    pub fn append_batch<'a, I>(&self, records: I) -> Result<(), WalError>
    where
        I: IntoIterator<Item = &'a WalRecord>,
    {
        let mut inner = self.lock();
        for record in records {
            write_record(&mut inner.writer, record)?;
        }
        self.flush_writer(&mut inner.writer)
    }

    /// Closes the active segment and opens the next one in append mode.
    pub fn rotate(&self) -> Result<(), WalError> {
        let mut inner = self.lock();
        inner.writer.flush()?;
        inner.writer.get_ref().sync_all()?;

        let next = inner.segment + 1;
        // Replacing the writer drops the old one, closing its file.
        inner.writer = Self::open_segment(&self.dir, next)?;
        inner.segment = next;
        Ok(())
    }

    /// Removes every segment file with id strictly less than `before`.
    ///
    /// Idempotent; removes nothing if no segment qualifies.
    pub fn truncate_before(&self, before: u64) -> Result<(), WalError> {
        for (id, path) in list_segments(&self.dir)? {
            if id < before {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// The id of the active (writable) segment.
    #[must_use]
    pub fn segment(&self) -> u64 {
        self.lock().segment
    }

    /// Flushes buffered records and fsyncs the active segment. The file
    /// handle itself is released when the `Wal` is dropped.
    pub fn close(&self) -> Result<(), WalError> {
        let mut inner = self.lock();
        inner.writer.flush()?;
        inner.writer.get_ref().sync_all()?;
        Ok(())
    }

    fn flush_writer(&self, writer: &mut BufWriter<File>) -> Result<(), WalError> {
        writer.flush()?;
        if self.sync {
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WalInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serializes one record into `w` without flushing.
fn write_record<W: Write>(w: &mut W, record: &WalRecord) -> Result<(), WalError> {
    match record {
        WalRecord::Put { key, value } => {
            w.write_u8(RECORD_PUT)?;
            w.write_u32::<BigEndian>(key.len() as u32)?;
            w.write_all(key)?;
            w.write_u32::<BigEndian>(value.len() as u32)?;
            w.write_all(value)?;
        }
        WalRecord::Delete { key } => {
            w.write_u8(RECORD_DELETE)?;
            w.write_u32::<BigEndian>(key.len() as u32)?;
            w.write_all(key)?;
            w.write_u32::<BigEndian>(0)?;
        }
    }
    Ok(())
}

/// Path of segment `id` inside `dir`: `wal_NNNNNN.log`, zero-padded so
/// lexical directory order matches numeric id order.
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("wal_{:06}.log", id))
}

/// All `wal_*.log` segments in `dir`, sorted ascending by id.
///
/// Files whose names do not parse as segments are ignored.
pub fn list_segments(dir: &Path) -> io::Result<Vec<(u64, PathBuf)>> {
    let mut segments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(id) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_segment_id)
        {
            segments.push((id, path));
        }
    }
    segments.sort_by_key(|(id, _)| *id);
    Ok(segments)
}

fn parse_segment_id(name: &str) -> Option<u64> {
    name.strip_prefix("wal_")?
        .strip_suffix(".log")?
        .parse()
        .ok()
}

/// Sequential reader over one WAL segment.
///
/// Generic over any `Read` implementor so tests can replay from in-memory
/// buffers.
///
/// A truncated tail record (a crash mid-write) is treated as a clean EOF --
/// all fully written records before it are still yielded. An unknown type
/// byte or an absurd length prefix mid-stream is fatal.
pub struct WalReader<R: Read> {
    rdr: BufReader<R>,
}

impl WalReader<File> {
    /// Opens an existing segment file for sequential replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<WalReader<File>, WalError> {
        let f = File::open(path)?;
        Ok(WalReader {
            rdr: BufReader::new(f),
        })
    }
}

impl<R: Read> WalReader<R> {
    /// Constructs a reader from any `Read` implementor.
    pub fn from_reader(reader: R) -> Self {
        WalReader {
            rdr: BufReader::new(reader),
        }
    }

    /// Replays every decodable record, calling `apply` for each one.
    ///
    /// # Termination
    ///
    /// - **Clean EOF** (no more bytes) -> `Ok(())`.
    /// - **Truncated tail** (partial record at end) -> `Ok(())` after
    ///   yielding all complete records before it.
    /// - **Unknown type byte** -> `Err(WalError::Corrupt)`.
    /// - **Implausible length prefix** -> `Err(WalError::Corrupt)`.
    /// - **I/O error** -> `Err(WalError::Io(...))`.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<(), WalError>
    where
        F: FnMut(WalRecord),
    {
        loop {
            let record_type = match self.rdr.read_u8() {
                Ok(t) => t,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(WalError::Io(e)),
            };
            if record_type != RECORD_PUT && record_type != RECORD_DELETE {
                return Err(WalError::Corrupt);
            }

            let key = match self.read_field(MAX_KEY_LEN)? {
                Some(k) => k,
                None => return Ok(()), // truncated tail
            };
            let value = match self.read_field(MAX_VALUE_LEN)? {
                Some(v) => v,
                None => return Ok(()),
            };

            match record_type {
                RECORD_PUT => apply(WalRecord::Put { key, value }),
                _ => apply(WalRecord::Delete { key }),
            }
        }
    }

    /// Reads one `[u32 len][bytes]` field. `Ok(None)` means the segment
    /// ended mid-field (tolerable tail).
    fn read_field(&mut self, max_len: u32) -> Result<Option<Vec<u8>>, WalError> {
        let len = match self.rdr.read_u32::<BigEndian>() {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(WalError::Io(e)),
        };
        if len > max_len {
            return Err(WalError::Corrupt);
        }

        let mut buf = vec![0u8; len as usize];
        match self.rdr.read_exact(&mut buf) {
            Ok(()) => Ok(Some(buf)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(WalError::Io(e)),
        }
    }
}
