use anyhow::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Every Nth record contributes an entry to the sparse index.
pub const INDEX_INTERVAL: usize = 128;

/// Size in bytes of each table's membership filter (8192 bits).
pub const BLOOM_SIZE_BYTES: usize = 1024;
/// Hash probes per key in the membership filter.
pub const BLOOM_HASHES: u32 = 3;

/// Reads reject length prefixes above these caps before allocating; a
/// corrupt prefix would otherwise request gigabytes.
const MAX_KEY_LEN: u32 = 64 * 1024 * 1024;
const MAX_VALUE_LEN: u32 = 256 * 1024 * 1024;

/// Serializes one `[key_len][key][value_len][value]` record.
pub(crate) fn write_record<W: Write>(w: &mut W, key: &[u8], value: &[u8]) -> io::Result<()> {
    w.write_u32::<BigEndian>(key.len() as u32)?;
    w.write_all(key)?;
    w.write_u32::<BigEndian>(value.len() as u32)?;
    w.write_all(value)?;
    Ok(())
}

/// On-disk size of a record with the given key and value lengths.
pub(crate) fn record_len(key_len: usize, value_len: usize) -> u64 {
    4 + key_len as u64 + 4 + value_len as u64
}

/// Decodes the next record from `r`.
///
/// Returns `Ok(None)` on a clean end of file -- no bytes where the next
/// key-length prefix would start. Anything that ends *inside* a record
/// (truncated key, missing value, an implausible length prefix) is a
/// malformed-framing error; callers scanning a range treat that the same as
/// end of file, callers resolving a point lookup propagate it.
pub(crate) fn read_record<R: Read>(r: &mut R) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    let key_len = match r.read_u32::<BigEndian>() {
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if key_len > MAX_KEY_LEN {
        return Err(malformed(format!("implausible key length {}", key_len)));
    }

    let mut key = vec![0u8; key_len as usize];
    r.read_exact(&mut key).map_err(mid_record)?;

    let value_len = r.read_u32::<BigEndian>().map_err(mid_record)?;
    if value_len > MAX_VALUE_LEN {
        return Err(malformed(format!("implausible value length {}", value_len)));
    }

    let mut value = vec![0u8; value_len as usize];
    r.read_exact(&mut value).map_err(mid_record)?;

    Ok(Some((key, value)))
}

/// `true` if `err` is malformed framing (truncated tail or mis-sized
/// prefix) rather than a genuine I/O failure.
pub(crate) fn is_malformed_framing(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<io::Error>().map(io::Error::kind),
        Some(io::ErrorKind::UnexpectedEof) | Some(io::ErrorKind::InvalidData)
    )
}

fn malformed(msg: String) -> anyhow::Error {
    anyhow::Error::new(io::Error::new(io::ErrorKind::InvalidData, msg))
}

fn mid_record(e: io::Error) -> anyhow::Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        anyhow::Error::new(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "sstable record truncated mid-record",
        ))
    } else {
        e.into()
    }
}
