//! # CLI - SiltKV Interactive Shell
//!
//! A REPL-style front-end for the SiltKV storage engine. Reads commands from
//! stdin, executes them against the engine, and prints results to stdout.
//! Works interactively and scripted (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! PUT key value        Insert or update a key-value pair
//! GET key              Look up a key (prints value or "(nil)")
//! DEL key              Delete a key (writes a tombstone)
//! BATCH k=v [k=v ...]  Insert a group of entries with one WAL flush
//! RANGE start end      Scan keys in [start, end], inclusive both ends
//! FLUSH                Force flush the memtable to an SSTable
//! COMPACT              Merge all SSTables into one
//! STATS                Print engine debug info
//! EXIT / QUIT          Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! All settings come from environment variables:
//!
//! ```text
//! SILT_DATA_DIR      Data directory                (default: "data")
//! SILT_FLUSH_BYTES   Memtable flush threshold      (default: 1048576)
//! SILT_MAX_SSTABLES  Compaction trigger            (default: 4)
//! SILT_WAL_SYNC      fsync every WAL append        (default: "false")
//! ```
//!
//! Log verbosity follows `RUST_LOG` (e.g. `RUST_LOG=engine=debug`).

use anyhow::Result;
use engine::{Config, Engine};
use std::io::{self, BufRead, Write};
use tracing_subscriber::{fmt, EnvFilter};

/// Reads a configuration value from the environment, falling back to
/// `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn load_config() -> Config {
    let defaults = Config::default();
    Config {
        data_dir: env_or("SILT_DATA_DIR", "data").into(),
        flush_threshold: env_or("SILT_FLUSH_BYTES", "1048576")
            .parse()
            .unwrap_or(defaults.flush_threshold),
        max_sstables: env_or("SILT_MAX_SSTABLES", "4")
            .parse()
            .unwrap_or(defaults.max_sstables),
        wal_sync: env_or("SILT_WAL_SYNC", "false").parse().unwrap_or(false),
    }
}

fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = load_config();
    println!(
        "SiltKV started (data_dir={}, flush={}B, max_sstables={}, wal_sync={})",
        cfg.data_dir.display(),
        cfg.flush_threshold,
        cfg.max_sstables,
        cfg.wal_sync
    );

    let mut engine = Engine::open(cfg)?;

    println!("Commands: PUT key value | GET key | DEL key | BATCH k=v ...");
    println!("          RANGE start end | FLUSH | COMPACT | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "PUT" => {
                    if let Some(k) = parts.next() {
                        let v: String = parts.collect::<Vec<&str>>().join(" ");
                        if v.is_empty() {
                            // The empty value is the tombstone encoding; a
                            // PUT of it would read back as a delete.
                            println!("ERR usage: PUT key value");
                        } else {
                            match engine.put(k.as_bytes().to_vec(), v.into_bytes()) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR put failed: {}", e),
                            }
                        }
                    } else {
                        println!("ERR usage: PUT key value");
                    }
                }
                "GET" => {
                    if let Some(k) = parts.next() {
                        match engine.get(k.as_bytes()) {
                            Ok(Some(v)) => println!("{}", String::from_utf8_lossy(&v)),
                            Ok(None) => println!("(nil)"),
                            Err(e) => println!("ERR read failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: GET key");
                    }
                }
                "DEL" => {
                    if let Some(k) = parts.next() {
                        match engine.delete(k.as_bytes().to_vec()) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR del failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: DEL key");
                    }
                }
                "BATCH" => {
                    let mut entries = std::collections::BTreeMap::new();
                    let mut ok = true;
                    for pair in parts {
                        match pair.split_once('=') {
                            Some((k, v)) => {
                                entries.insert(k.as_bytes().to_vec(), v.as_bytes().to_vec());
                            }
                            None => {
                                println!("ERR usage: BATCH key=value [key=value ...]");
                                ok = false;
                                break;
                            }
                        }
                    }
                    if ok {
                        if entries.is_empty() {
                            println!("ERR usage: BATCH key=value [key=value ...]");
                        } else {
                            let count = entries.len();
                            match engine.batch_put(entries) {
                                Ok(()) => println!("OK ({} entries)", count),
                                Err(e) => println!("ERR batch failed: {}", e),
                            }
                        }
                    }
                }
                "RANGE" => {
                    let start = parts.next().unwrap_or("");
                    let end = parts.next().unwrap_or("");
                    if start.is_empty() || end.is_empty() {
                        println!("ERR usage: RANGE start end");
                    } else {
                        match engine.read_key_range(start.as_bytes(), end.as_bytes()) {
                            Ok(results) => {
                                if results.is_empty() {
                                    println!("(empty)");
                                } else {
                                    for (k, v) in &results {
                                        println!(
                                            "{} -> {}",
                                            String::from_utf8_lossy(k),
                                            String::from_utf8_lossy(v)
                                        );
                                    }
                                    println!("({} entries)", results.len());
                                }
                            }
                            Err(e) => println!("ERR range failed: {}", e),
                        }
                    }
                }
                "FLUSH" => match engine.flush() {
                    Ok(()) => println!("OK (sstables={})", engine.sstable_count()),
                    Err(e) => println!("ERR flush failed: {}", e),
                },
                "COMPACT" => match engine.compact() {
                    Ok(()) => println!("OK (sstables={})", engine.sstable_count()),
                    Err(e) => println!("ERR compact failed: {}", e),
                },
                "STATS" => {
                    println!("{:?}", engine);
                }
                "EXIT" | "QUIT" => {
                    engine.close()?;
                    println!("bye");
                    break;
                }
                other => {
                    println!("unknown command: {}", other);
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
