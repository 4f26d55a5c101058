// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! A collection whose mutations are recorded in a write-ahead log.
//!
//! Every insert, update and delete is applied in memory and appended to the
//! [`Wal`] under the collection's exclusive lock. If the append fails the
//! in-memory change is undone, so memory never runs ahead of the log.
//! Opening replays the log to rebuild the collection with the ids that were
//! originally assigned.
//!
//! Payloads are stored in the record's metadata bytes using bincode.

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use super::{Collection, CollectionConfig, Mutation, SearchHit};
use crate::error::Result;
use crate::index::{DefaultIndexFactory, IndexFactory};
use crate::vector::Vector;
use crate::wal::{
    DeletePayload, InsertPayload, LogRecord, Operation, ReplayStats, Wal, WalConfig,
};

/// [`Collection`] plus [`Wal`].
///
/// # Examples
///
/// ```rust
/// use sangita::{CollectionConfig, DurableCollection, IndexKind, SimilarityMetric, WalConfig};
///
/// let dir = tempfile::tempdir().unwrap();
/// let config =
///     CollectionConfig::new("docs", 2, SimilarityMetric::Cosine, IndexKind::Linear).unwrap();
///
/// let id = {
///     let docs = DurableCollection::<String>::open(config.clone(), dir.path(), WalConfig::default())
///         .unwrap();
///     docs.insert(&[1.0, 0.0], "first".to_string()).unwrap()
/// };
///
/// let docs = DurableCollection::<String>::open(config, dir.path(), WalConfig::default()).unwrap();
/// assert_eq!(docs.get(&id).as_deref(), Some("first"));
/// ```
pub struct DurableCollection<P> {
    collection: Collection<P>,
    wal: Wal,
    recovered: ReplayStats,
}

impl<P> DurableCollection<P>
where
    P: Serialize + DeserializeOwned,
{
    /// Opens (or creates) the log in `dir` and rebuilds the collection from it.
    ///
    /// # Errors
    ///
    /// Configuration errors, WAL open and replay errors, and payload
    /// deserialization errors are propagated.
    pub fn open(config: CollectionConfig, dir: impl AsRef<Path>, wal_config: WalConfig) -> Result<Self> {
        Self::open_with_factory(config, &DefaultIndexFactory, dir, wal_config)
    }

    /// Like [`open`](Self::open) with a caller-supplied index factory.
    pub fn open_with_factory(
        config: CollectionConfig,
        factory: &dyn IndexFactory,
        dir: impl AsRef<Path>,
        wal_config: WalConfig,
    ) -> Result<Self> {
        let collection = Collection::with_factory(config, factory)?;
        let wal = Wal::open(dir, wal_config)?;
        let recovered = wal.replay(|record| apply(&collection, record))?;
        info!(
            collection = %collection.config().name,
            records = recovered.records,
            entries = collection.len(),
            lsn = wal.last_lsn(),
            "recovered collection from WAL"
        );
        Ok(Self {
            collection,
            wal,
            recovered,
        })
    }

    /// Inserts and logs a new entry; see [`Collection::insert`].
    pub fn insert(&self, values: &[f32], payload: P) -> Result<String> {
        self.collection
            .insert_logged(values, payload, |m| self.log(m))
    }

    /// Replaces and logs an entry; see [`Collection::update`].
    pub fn update(&self, id: &str, values: &[f32], payload: P) -> Result<()> {
        self.collection
            .update_logged(id, values, payload, |m| self.log(m))
    }

    /// Removes and logs an entry; see [`Collection::delete`].
    pub fn delete(&self, id: &str) -> Result<()> {
        self.collection.delete_logged(id, |m| self.log(m))
    }

    fn log(&self, mutation: &Mutation<'_, P>) -> Result<()> {
        self.wal.append(&to_operation(mutation)?)?;
        Ok(())
    }
}

impl<P> DurableCollection<P> {
    /// Top-k search; see [`Collection::search`].
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.collection.search(query, k)
    }

    /// Returns `true` if `id` is a live external id.
    pub fn contains(&self, id: &str) -> bool {
        self.collection.contains(id)
    }

    /// Returns the stored (normalized) vector for `id`.
    pub fn get_vector(&self, id: &str) -> Option<Vector> {
        self.collection.get_vector(id)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.collection.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// The in-memory collection.
    pub fn collection(&self) -> &Collection<P> {
        &self.collection
    }

    /// The underlying log.
    pub fn wal(&self) -> &Wal {
        &self.wal
    }

    /// What replay found when the collection was opened.
    pub fn recovered(&self) -> ReplayStats {
        self.recovered
    }

    /// Forces logged mutations to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.wal.sync()
    }

    /// Syncs and closes the log.
    pub fn close(self) -> Result<()> {
        self.wal.close()
    }
}

impl<P: Clone> DurableCollection<P> {
    /// Returns a copy of the payload stored under `id`.
    pub fn get(&self, id: &str) -> Option<P> {
        self.collection.get(id)
    }
}

impl<P> fmt::Debug for DurableCollection<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableCollection")
            .field("collection", &self.collection)
            .field("wal", &self.wal)
            .finish()
    }
}

fn to_operation<P: Serialize>(mutation: &Mutation<'_, P>) -> Result<Operation> {
    let op = match *mutation {
        Mutation::Insert {
            external_id,
            internal_id,
            vector,
            payload,
        } => Operation::Insert(InsertPayload {
            external_id: external_id.to_string(),
            internal_id,
            vector: vector.values(),
            metadata: bincode::serialize(payload)?,
        }),
        Mutation::Update {
            external_id,
            internal_id,
            vector,
            payload,
        } => Operation::Update(InsertPayload {
            external_id: external_id.to_string(),
            internal_id,
            vector: vector.values(),
            metadata: bincode::serialize(payload)?,
        }),
        Mutation::Delete {
            external_id,
            internal_id,
        } => Operation::Delete(DeletePayload {
            external_id: external_id.to_string(),
            internal_id,
        }),
    };
    Ok(op)
}

fn apply<P: DeserializeOwned>(collection: &Collection<P>, record: LogRecord) -> Result<()> {
    match record.operation {
        Operation::Insert(p) => {
            let payload = bincode::deserialize(&p.metadata)?;
            collection.restore(p.external_id, p.internal_id, &p.vector, payload)
        }
        Operation::Update(p) => {
            let payload = bincode::deserialize(&p.metadata)?;
            collection.update(&p.external_id, &p.vector, payload)
        }
        Operation::Delete(p) => collection.delete(&p.external_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::SimilarityMetric;
    use crate::types::IndexKind;
    use crate::wal::SyncPolicy;
    use tempfile::tempdir;

    fn config() -> CollectionConfig {
        CollectionConfig::new("durable", 2, SimilarityMetric::Cosine, IndexKind::Linear).unwrap()
    }

    fn wal_config() -> WalConfig {
        WalConfig {
            sync_policy: SyncPolicy::Os,
            ..WalConfig::default()
        }
    }

    #[test]
    fn test_each_mutation_appends_one_record() {
        let dir = tempdir().unwrap();
        let c = DurableCollection::<u64>::open(config(), dir.path(), wal_config()).unwrap();
        let id = c.insert(&[1.0, 0.0], 1).unwrap();
        c.update(&id, &[0.0, 1.0], 2).unwrap();
        c.delete(&id).unwrap();
        assert_eq!(c.wal().last_lsn(), 3);
    }

    #[test]
    fn test_rejected_mutation_is_not_logged() {
        let dir = tempdir().unwrap();
        let c = DurableCollection::<u64>::open(config(), dir.path(), wal_config()).unwrap();
        assert!(c.insert(&[1.0, 0.0, 0.0], 1).is_err());
        assert!(c.delete("missing").is_err());
        assert_eq!(c.wal().last_lsn(), 0);
    }

    #[test]
    fn test_reopen_restores_ids_and_counter() {
        let dir = tempdir().unwrap();
        let (a, b) = {
            let c = DurableCollection::<u64>::open(config(), dir.path(), wal_config()).unwrap();
            let a = c.insert(&[1.0, 0.0], 10).unwrap();
            let b = c.insert(&[0.0, 1.0], 20).unwrap();
            c.delete(&b).unwrap();
            c.close().unwrap();
            (a, b)
        };

        let c = DurableCollection::<u64>::open(config(), dir.path(), wal_config()).unwrap();
        assert_eq!(c.recovered().records, 3);
        assert_eq!(c.get(&a), Some(10));
        assert!(!c.contains(&b));

        let new = c.insert(&[1.0, 1.0], 30).unwrap();
        let state = c.collection().state.read();
        assert_eq!(state.ids.internal(&new), Some(3));
    }
}
