//! Basic Collection Demo
//!
//! This demo shows the in-memory collection API:
//! - Creating a collection with a metric and index kind
//! - Inserting vectors with payloads
//! - Top-k search
//! - Update and delete
//!
//! Run with: cargo run --example basic_collection

use sangita::{Collection, CollectionConfig, DataType, IndexKind, Result, SimilarityMetric};

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
    println!("=== Sangita Collection Demo ===\n");

    let config = CollectionConfig::new("fruit", 3, SimilarityMetric::Cosine, IndexKind::Linear)?
        .with_data_type(DataType::Text)
        .with_model_name("toy-embedder")?;
    let fruit: Collection<String> = Collection::new(config)?;

    // 1. Insert
    println!("1. Inserting vectors...");
    let items = [
        ("apple", [0.9, 0.1, 0.0]),
        ("banana", [0.1, 0.9, 0.1]),
        ("cherry", [0.8, 0.0, 0.3]),
        ("grape", [0.2, 0.3, 0.9]),
    ];
    let mut ids = Vec::new();
    for (name, values) in items {
        let id = fruit.insert(&values, name.to_string())?;
        println!("   {name:<8} -> {id}");
        ids.push(id);
    }
    println!("   {} entries\n", fruit.len());

    // 2. Search
    println!("2. Searching for [1.0, 0.0, 0.1]...");
    for hit in fruit.search(&[1.0, 0.0, 0.1], 3)? {
        let name = fruit.get(&hit.id).unwrap_or_default();
        println!("   {name:<8} score {:.4}", hit.score);
    }
    println!();

    // 3. Update
    println!("3. Moving 'grape' next to 'apple'...");
    fruit.update(&ids[3], &[0.95, 0.05, 0.0], "green grape".to_string())?;
    let top = fruit.search(&[1.0, 0.0, 0.0], 1)?;
    println!("   nearest to [1, 0, 0]: {:?}\n", fruit.get(&top[0].id));

    // 4. Delete
    println!("4. Deleting 'banana'...");
    fruit.delete(&ids[1])?;
    println!("   contains banana: {}", fruit.contains(&ids[1]));
    println!("   {} entries remain", fruit.len());

    // 5. Validation
    println!("\n5. Rejected inputs:");
    if let Err(e) = fruit.insert(&[0.0, 0.0, 0.0], "nothing".to_string()) {
        println!("   zero vector: {e}");
    }
    if let Err(e) = fruit.search(&[1.0, 0.0], 1) {
        println!("   short query: {e}");
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
