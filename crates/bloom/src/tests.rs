use super::*;
use std::io::Cursor;
use tempfile::tempdir;

// -------------------- Construction --------------------

#[test]
fn new_creates_valid_filter() {
    let bf = BloomFilter::new(1024, 3);
    assert_eq!(bf.num_bits(), 8192);
    assert_eq!(bf.num_hashes(), 3);
}

#[test]
#[should_panic(expected = "size_bytes must be > 0")]
fn new_panics_on_zero_size() {
    BloomFilter::new(0, 3);
}

#[test]
#[should_panic(expected = "hashes must be > 0")]
fn new_panics_on_zero_hashes() {
    BloomFilter::new(1024, 0);
}

// -------------------- Add / might_contain --------------------

#[test]
fn added_key_is_found() {
    let mut bf = BloomFilter::new(1024, 3);
    bf.add(b"hello");
    assert!(bf.might_contain(b"hello"));
}

#[test]
fn empty_filter_rejects_everything() {
    let bf = BloomFilter::new(1024, 3);
    assert!(!bf.might_contain(b"hello"));
    assert!(!bf.might_contain(b""));
}

#[test]
fn no_false_negatives() {
    let mut bf = BloomFilter::new(1024, 3);
    for i in 0..1000u64 {
        bf.add(format!("key{}", i).as_bytes());
    }
    for i in 0..1000u64 {
        assert!(
            bf.might_contain(format!("key{}", i).as_bytes()),
            "key{} should be found",
            i
        );
    }
}

#[test]
fn false_positive_rate_is_reasonable() {
    // 1 KiB / 3 probes holds ~500 keys well below saturation.
    let mut bf = BloomFilter::new(1024, 3);
    for i in 0..500u64 {
        bf.add(format!("present{}", i).as_bytes());
    }

    let mut false_positives = 0;
    let test_count = 10_000;
    for i in 0..test_count {
        if bf.might_contain(format!("absent{}", i).as_bytes()) {
            false_positives += 1;
        }
    }

    let actual_fpr = false_positives as f64 / test_count as f64;
    assert!(actual_fpr < 0.15, "FPR too high: {:.4}", actual_fpr);
}

#[test]
fn empty_key() {
    let mut bf = BloomFilter::new(64, 3);
    bf.add(b"");
    assert!(bf.might_contain(b""));
}

#[test]
fn binary_key() {
    let mut bf = BloomFilter::new(64, 3);
    let key = vec![0u8, 1, 2, 255, 254, 253];
    bf.add(&key);
    assert!(bf.might_contain(&key));
}

#[test]
fn hashing_is_deterministic_across_instances() {
    // Two independently built filters over the same keys must agree bit for
    // bit, otherwise persisted filters would not round-trip across runs.
    let mut a = BloomFilter::new(256, 3);
    let mut b = BloomFilter::new(256, 3);
    for i in 0..100u64 {
        a.add(&i.to_be_bytes());
        b.add(&i.to_be_bytes());
    }
    assert_eq!(a.bits, b.bits);
}

// -------------------- Serialization --------------------

#[test]
fn roundtrip_serialize_deserialize() {
    let mut bf = BloomFilter::new(1024, 3);
    for i in 0..500u64 {
        bf.add(&i.to_be_bytes());
    }

    let mut buf = Vec::new();
    bf.write_to(&mut buf).unwrap();

    let bf2 = BloomFilter::read_from(&mut Cursor::new(&buf)).unwrap();
    assert_eq!(bf2.num_bits(), bf.num_bits());
    assert_eq!(bf2.num_hashes(), bf.num_hashes());
    assert_eq!(bf2.bits, bf.bits);

    for i in 0..500u64 {
        assert!(
            bf2.might_contain(&i.to_be_bytes()),
            "key {} missing after roundtrip",
            i
        );
    }
}

#[test]
fn save_and_load_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("filter.bloom");

    let mut bf = BloomFilter::new(1024, 3);
    bf.add(b"persisted");
    bf.save(&path).unwrap();

    let loaded = BloomFilter::load(&path).unwrap();
    assert!(loaded.might_contain(b"persisted"));
    assert!(!loaded.might_contain(b"never-added"));
}

#[test]
fn load_missing_file_errors() {
    let result = BloomFilter::load("/tmp/does_not_exist.bloom");
    assert!(result.is_err());
}

#[test]
fn load_truncated_file_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.bloom");
    std::fs::write(&path, [0u8, 0, 0]).unwrap();

    assert!(BloomFilter::load(&path).is_err());
}

#[test]
fn read_rejects_oversized_bits_len() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&3u32.to_be_bytes()); // num_hashes
    buf.extend_from_slice(&(256 * 1024 * 1024u32).to_be_bytes()); // bits_len = 256 MiB

    let result = BloomFilter::read_from(&mut Cursor::new(&buf));
    assert!(result.is_err());
}

#[test]
fn read_rejects_zero_hashes() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&0u32.to_be_bytes()); // num_hashes = 0
    buf.extend_from_slice(&8u32.to_be_bytes());
    buf.extend_from_slice(&[0u8; 8]);

    let result = BloomFilter::read_from(&mut Cursor::new(&buf));
    assert!(result.is_err());
}

// -------------------- Debug --------------------

#[test]
fn debug_impl_works() {
    let bf = BloomFilter::new(1024, 3);
    let debug = format!("{:?}", bf);
    assert!(debug.contains("BloomFilter"));
    assert!(debug.contains("num_bits"));
}
