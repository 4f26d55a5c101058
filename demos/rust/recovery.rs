//! Recovery Demo
//!
//! This demo shows crash recovery for a durable collection:
//! - Writing entries and dropping the collection without close()
//! - Reopening and replaying the write-ahead log
//! - Appending a torn record and watching it get repaired
//!
//! Run with: cargo run --example recovery

use std::fs::OpenOptions;
use std::io::Write;

use sangita::wal::segment_path;
use sangita::{
    CollectionConfig, DurableCollection, IndexKind, Result, SimilarityMetric, SyncPolicy,
    WalConfig,
};

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sangita=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() -> Result<()> {
    init_logging();
    println!("=== Sangita Recovery Demo ===\n");

    let dir = tempfile::tempdir()?;
    let config = CollectionConfig::new("notes", 4, SimilarityMetric::Dot, IndexKind::Linear)?;
    let wal_config = WalConfig {
        sync_policy: SyncPolicy::Always,
        max_segment_size: 4 * 1024,
    };

    // 1. Write and "crash"
    println!("1. Writing 100 entries and simulating a crash...");
    let kept = {
        let notes = DurableCollection::<u32>::open(config.clone(), dir.path(), wal_config)?;
        let mut kept = Vec::new();
        for i in 0..100u32 {
            let x = i as f32;
            let id = notes.insert(&[1.0, x, x * 0.5, 1.0 / (x + 1.0)], i)?;
            if i % 10 == 0 {
                notes.delete(&id)?;
            } else {
                kept.push(id);
            }
        }
        println!(
            "   {} live entries, last LSN {}, segment {}",
            notes.len(),
            notes.wal().last_lsn(),
            notes.wal().active_segment_id()
        );
        drop(notes);
        kept
    };

    // 2. Reopen
    println!("\n2. Reopening...");
    let active_segment = {
        let notes = DurableCollection::<u32>::open(config.clone(), dir.path(), wal_config)?;
        let stats = notes.recovered();
        println!(
            "   replayed {} records from {} segments",
            stats.records, stats.segments
        );
        let intact = kept.iter().all(|id| notes.contains(id));
        println!("   {} entries, all kept ids present: {intact}", notes.len());
        notes.wal().active_segment_id()
    };

    // 3. Torn write
    println!("\n3. Appending a torn record to segment {active_segment}...");
    {
        let mut file = OpenOptions::new()
            .append(true)
            .open(segment_path(dir.path(), active_segment))?;
        // A header cut off after its length field.
        let mut torn = b"SANGITA\x01".to_vec();
        torn.extend_from_slice(&500u32.to_le_bytes());
        file.write_all(&torn)?;
    }
    let notes = DurableCollection::<u32>::open(config, dir.path(), wal_config)?;
    println!(
        "   recovered {} entries, next insert gets LSN {}",
        notes.len(),
        notes.wal().last_lsn() + 1
    );
    notes.insert(&[1.0, 1.0, 1.0, 1.0], 999)?;
    notes.close()?;

    println!("\n=== Demo Complete ===");
    Ok(())
}
