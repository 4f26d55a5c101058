//! Property-based tests for rebuilding a collection from its WAL.
//!
//! Any sequence of logged inserts, updates, and deletes, followed by a
//! reopen, yields a collection with the same ids, payloads, and vectors.

use std::collections::HashMap;

use proptest::prelude::*;
use sangita::{
    CollectionConfig, DurableCollection, IndexKind, SangitaError, SimilarityMetric, SyncPolicy,
    Vector, WalConfig,
};
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Doc {
    title: String,
    tags: Vec<String>,
}

fn config() -> CollectionConfig {
    CollectionConfig::new("docs", 3, SimilarityMetric::Cosine, IndexKind::Linear)
        .expect("valid config")
}

fn wal_config() -> WalConfig {
    WalConfig {
        sync_policy: SyncPolicy::Always,
        max_segment_size: 512,
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert([f32; 3], String),
    Update(usize, [f32; 3], String),
    Delete(usize),
}

fn arb_values() -> impl Strategy<Value = [f32; 3]> {
    (0.1f32..10.0, -10.0f32..10.0, -10.0f32..10.0).prop_map(|(a, b, c)| [a, b, c])
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            4 => (arb_values(), "[a-z]{1,12}").prop_map(|(v, t)| Op::Insert(v, t)),
            1 => (any::<usize>(), arb_values(), "[a-z]{1,12}").prop_map(|(i, v, t)| Op::Update(i, v, t)),
            1 => any::<usize>().prop_map(Op::Delete),
        ],
        1..30,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Reopening replays every mutation: live ids, payloads, and stored
    /// vectors match what was there before the drop.
    #[test]
    fn prop_reopen_restores_state(ops in arb_ops()) {
        let dir = tempdir().expect("failed to create temp dir");
        let mut expected: HashMap<String, Doc> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut vectors: HashMap<String, Vector> = HashMap::new();

        {
            let docs = DurableCollection::<Doc>::open(config(), dir.path(), wal_config()).unwrap();
            for op in ops {
                match op {
                    Op::Insert(values, title) => {
                        let doc = Doc { title, tags: vec!["t".into()] };
                        let id = docs.insert(&values, doc.clone()).unwrap();
                        expected.insert(id.clone(), doc);
                        order.push(id);
                    }
                    Op::Update(i, values, title) if !order.is_empty() => {
                        let id = order[i % order.len()].clone();
                        let doc = Doc { title, tags: Vec::new() };
                        docs.update(&id, &values, doc.clone()).unwrap();
                        expected.insert(id, doc);
                    }
                    Op::Delete(i) if !order.is_empty() => {
                        let id = order.remove(i % order.len());
                        docs.delete(&id).unwrap();
                        expected.remove(&id);
                    }
                    _ => {}
                }
            }
            for id in &order {
                vectors.insert(id.clone(), docs.get_vector(id).unwrap());
            }
            // Dropped without close().
        }

        let docs = DurableCollection::<Doc>::open(config(), dir.path(), wal_config()).unwrap();
        prop_assert_eq!(docs.len(), expected.len());
        prop_assert_eq!(docs.collection().index_len(), expected.len());
        prop_assert!(!docs.recovered().torn_tail);
        for (id, doc) in &expected {
            let stored = docs.get(id);
            prop_assert_eq!(stored.as_ref(), Some(doc));
            let restored = docs.get_vector(id).unwrap().values();
            let original = vectors[id].values();
            for (a, b) in restored.iter().zip(&original) {
                prop_assert!((a - b).abs() < 1e-6, "vector for {} drifted", id);
            }
        }
    }
}

#[test]
fn test_new_ids_do_not_reuse_replayed_ones() {
    let dir = tempdir().unwrap();
    let first = {
        let docs = DurableCollection::<u32>::open(config(), dir.path(), wal_config()).unwrap();
        let id = docs.insert(&[1.0, 0.0, 0.0], 1).unwrap();
        let gone = docs.insert(&[0.0, 1.0, 0.0], 2).unwrap();
        docs.delete(&gone).unwrap();
        docs.close().unwrap();
        id
    };

    let docs = DurableCollection::<u32>::open(config(), dir.path(), wal_config()).unwrap();
    let second = docs.insert(&[0.0, 0.0, 1.0], 3).unwrap();
    assert_ne!(first, second);
    assert_eq!(docs.len(), 2);

    // Search after recovery sees both live entries.
    let hits = docs.search(&[1.0, 0.0, 0.0], 5).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, first);
}

#[test]
fn test_dimension_change_is_rejected_on_replay() {
    let dir = tempdir().unwrap();
    {
        let docs = DurableCollection::<u32>::open(config(), dir.path(), wal_config()).unwrap();
        docs.insert(&[1.0, 0.0, 0.0], 1).unwrap();
    }

    let narrower =
        CollectionConfig::new("docs", 2, SimilarityMetric::Cosine, IndexKind::Linear).unwrap();
    assert!(matches!(
        DurableCollection::<u32>::open(narrower, dir.path(), wal_config()),
        Err(SangitaError::DimensionMismatch {
            expected: 2,
            got: 3
        })
    ));
}

#[test]
fn test_open_missing_directory() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        DurableCollection::<u32>::open(config(), dir.path().join("absent"), wal_config()),
        Err(SangitaError::DirectoryNotFound(_))
    ));
}
