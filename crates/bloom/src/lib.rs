//! # Bloom Filter
//!
//! A space-efficient probabilistic data structure for set membership testing.
//!
//! A bloom filter can tell you with certainty that a key is **not** in the set
//! (no false negatives), but may occasionally report that a key **is** in the
//! set when it isn't (false positives).
//!
//! ## Usage in SiltKV
//!
//! Each sorted table file carries a bloom filter of its keys in a `.bloom`
//! sidecar. During point lookups the engine checks the filter first -- if it
//! says "not present", the table is skipped entirely, avoiding the sparse
//! index lookup and the disk scan.
//!
//! The filter is sized at construction (the sstable crate uses 1 KiB with 3
//! probes) and never grows. Hashing is seeded FNV-1a, so a filter written by
//! one process run answers identically after being loaded by another.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::new(1024, 3);
//! bf.add(b"hello");
//! assert!(bf.might_contain(b"hello"));
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A bloom filter backed by a fixed-size bit vector with `k` hash probes.
///
/// Each probe hashes the concatenation of a single seed byte (the probe
/// index) and the key with FNV-1a, modulo the bit count.
pub struct BloomFilter {
    /// The bit vector storing the filter state.
    bits: Vec<u8>,
    /// Number of hash probes (k).
    hashes: u32,
}

impl BloomFilter {
    /// Creates an empty filter over `size_bytes * 8` bits with `hashes`
    /// probes per key.
    ///
    /// # Panics
    ///
    /// Panics if `size_bytes` or `hashes` is 0.
    pub fn new(size_bytes: usize, hashes: u32) -> Self {
        assert!(size_bytes > 0, "size_bytes must be > 0");
        assert!(hashes > 0, "hashes must be > 0");
        Self {
            bits: vec![0u8; size_bytes],
            hashes,
        }
    }

    /// Adds a key to the filter, setting `k` bits.
    pub fn add(&mut self, key: &[u8]) {
        for seed in 0..self.hashes {
            let idx = self.probe(key, seed as u8);
            self.bits[(idx / 8) as usize] |= 1 << (idx % 8);
        }
    }

    /// Returns `true` if the key **might** be in the set, `false` if it is
    /// **definitely not** in the set.
    #[must_use]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        for seed in 0..self.hashes {
            let idx = self.probe(key, seed as u8);
            if self.bits[(idx / 8) as usize] & (1 << (idx % 8)) == 0 {
                return false;
            }
        }
        true
    }

    /// Returns the number of bits in the filter.
    #[must_use]
    pub fn num_bits(&self) -> u64 {
        self.bits.len() as u64 * 8
    }

    /// Returns the number of hash probes.
    #[must_use]
    pub fn num_hashes(&self) -> u32 {
        self.hashes
    }

    /// Serializes the filter to a writer.
    ///
    /// Wire format (big-endian):
    /// ```text
    /// [num_hashes: u32][bits_len: u32][bits: bytes]
    /// ```
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<BigEndian>(self.hashes)?;
        w.write_u32::<BigEndian>(self.bits.len() as u32)?;
        w.write_all(&self.bits)?;
        Ok(())
    }

    /// Deserializes a filter from a reader.
    ///
    /// Returns `InvalidData` for a zero probe count or an implausible bit
    /// array length, so a corrupted sidecar surfaces as a load error rather
    /// than a filter that answers garbage.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let hashes = r.read_u32::<BigEndian>()?;
        let bits_len = r.read_u32::<BigEndian>()? as usize;

        const MAX_BLOOM_BYTES: usize = 128 * 1024 * 1024;
        if hashes == 0 || bits_len == 0 || bits_len > MAX_BLOOM_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "implausible bloom filter: {} hashes, {} bytes",
                    hashes, bits_len
                ),
            ));
        }

        let mut bits = vec![0u8; bits_len];
        r.read_exact(&mut bits)?;

        Ok(Self { bits, hashes })
    }

    /// Writes the filter to `path` and fsyncs it.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);
        self.write_to(&mut w)?;
        w.flush()?;
        w.get_ref().sync_all()?;
        Ok(())
    }

    /// Loads a filter previously written by [`save`](BloomFilter::save).
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::read_from(&mut BufReader::new(file))
    }

    /// One FNV-1a probe over `[seed, key...]`, reduced modulo the bit count.
    fn probe(&self, key: &[u8], seed: u8) -> u64 {
        const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
        const FNV_PRIME: u64 = 0x00000100000001b3;

        let mut hash = FNV_OFFSET_BASIS;
        hash ^= seed as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        for &byte in key {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash % self.num_bits()
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits())
            .field("num_hashes", &self.hashes)
            .finish()
    }
}

#[cfg(test)]
mod tests;
