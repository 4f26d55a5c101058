// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Named vector collections.
//!
//! A [`Collection`] binds a [`CollectionConfig`] to one index and keeps two
//! parallel maps: externally visible string ids to [`InternalId`]s and back.
//! External ids are random UUIDs; internal ids come from a per-collection
//! counter and are never reused. Each entry also carries a caller-defined
//! payload `P`.
//!
//! # Consistency
//!
//! Mutations take an exclusive lock and reads take a shared one, so
//! observers never see the maps and the index disagree. A failed insert
//! removes its provisional map entries before returning, and a failed
//! delete leaves the maps untouched.
//!
//! # Example
//!
//! ```rust
//! use sangita::{Collection, CollectionConfig, IndexKind, SimilarityMetric};
//!
//! let config =
//!     CollectionConfig::new("docs", 2, SimilarityMetric::Cosine, IndexKind::Linear).unwrap();
//! let collection: Collection<&str> = Collection::new(config).unwrap();
//!
//! let east = collection.insert(&[1.0, 0.0], "east").unwrap();
//! collection.insert(&[0.0, 1.0], "north").unwrap();
//!
//! let hits = collection.search(&[0.9, 0.1], 1).unwrap();
//! assert_eq!(hits[0].id, east);
//! assert_eq!(collection.get(&east), Some("east"));
//! ```

mod config;
mod durable;

pub use config::CollectionConfig;
pub use durable::DurableCollection;

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SangitaError};
use crate::index::{DefaultIndexFactory, IndexFactory, VectorIndex};
use crate::types::InternalId;
use crate::vector::Vector;

/// One search result, addressed by external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// External id of the matching entry.
    pub id: String,
    /// Similarity score (higher = more similar).
    pub score: f64,
}

/// A mutation about to be committed, handed to the commit hook while the
/// collection lock is held.
pub(crate) enum Mutation<'a, P> {
    Insert {
        external_id: &'a str,
        internal_id: InternalId,
        vector: &'a Vector,
        payload: &'a P,
    },
    Update {
        external_id: &'a str,
        internal_id: InternalId,
        vector: &'a Vector,
        payload: &'a P,
    },
    Delete {
        external_id: &'a str,
        internal_id: InternalId,
    },
}

/// Bidirectional id map. Both directions are always updated together.
#[derive(Debug, Default)]
struct IdMap {
    by_external: HashMap<String, InternalId>,
    by_internal: HashMap<InternalId, String>,
}

impl IdMap {
    fn insert(&mut self, external: String, internal: InternalId) {
        self.by_internal.insert(internal, external.clone());
        self.by_external.insert(external, internal);
    }

    fn remove(&mut self, external: &str) -> Option<InternalId> {
        let internal = self.by_external.remove(external)?;
        self.by_internal.remove(&internal);
        Some(internal)
    }

    fn internal(&self, external: &str) -> Option<InternalId> {
        self.by_external.get(external).copied()
    }

    fn external(&self, internal: InternalId) -> Option<&str> {
        self.by_internal.get(&internal).map(String::as_str)
    }

    fn len(&self) -> usize {
        self.by_external.len()
    }
}

struct State<P> {
    /// Last internal id handed out.
    id_counter: InternalId,
    ids: IdMap,
    payloads: HashMap<String, P>,
}

/// A named, fixed-dimension set of vectors with payloads.
///
/// Thread-safe: every method takes `&self`.
pub struct Collection<P> {
    config: CollectionConfig,
    index: Box<dyn VectorIndex>,
    state: RwLock<State<P>>,
}

impl<P> Collection<P> {
    /// Creates an empty collection backed by the built-in index for
    /// `config.index_kind`.
    ///
    /// # Errors
    ///
    /// * `SangitaError::InvalidCollectionName` / `InvalidDimension` / `InvalidModelName` - If `config` is invalid
    /// * `SangitaError::UnsupportedIndexKind` - If no index implementation exists for the kind
    pub fn new(config: CollectionConfig) -> Result<Self> {
        Self::with_factory(config, &DefaultIndexFactory)
    }

    /// Creates an empty collection whose index is built by `factory`.
    pub fn with_factory(config: CollectionConfig, factory: &dyn IndexFactory) -> Result<Self> {
        config.validate()?;
        let index = factory.create_index(config.index_config()?)?;
        info!(
            collection = %config.name,
            dimension = config.dimension,
            metric = %config.metric,
            index_kind = %config.index_kind,
            "created collection"
        );
        Ok(Self {
            config,
            index,
            state: RwLock::new(State {
                id_counter: 0,
                ids: IdMap::default(),
                payloads: HashMap::new(),
            }),
        })
    }

    fn check_dimension(&self, values: &[f32]) -> Result<()> {
        if values.len() != self.config.dimension {
            return Err(SangitaError::DimensionMismatch {
                expected: self.config.dimension,
                got: values.len(),
            });
        }
        Ok(())
    }

    fn to_vector(&self, values: &[f32]) -> Result<Vector> {
        self.check_dimension(values)?;
        Vector::new(values, self.config.dimension)
    }

    /// Stores `values` with `payload` under a fresh external id and returns it.
    ///
    /// # Errors
    ///
    /// * `SangitaError::DimensionMismatch` - If `values.len()` differs from the collection dimension
    /// * Vector construction errors (`NonFiniteValue`, `ZeroMagnitude`)
    /// * `SangitaError::InternalIdCollision` - If the index already held the new internal id
    ///
    /// On any error the collection is unchanged.
    pub fn insert(&self, values: &[f32], payload: P) -> Result<String> {
        self.insert_logged(values, payload, |_| Ok(()))
    }

    pub(crate) fn insert_logged<F>(&self, values: &[f32], payload: P, commit: F) -> Result<String>
    where
        F: FnOnce(&Mutation<'_, P>) -> Result<()>,
    {
        let vector = self.to_vector(values)?;
        let mut state = self.state.write();

        let external_id = loop {
            let candidate = Uuid::new_v4().to_string();
            if state.ids.internal(&candidate).is_none() {
                break candidate;
            }
        };
        state.id_counter += 1;
        let internal_id = state.id_counter;
        state.ids.insert(external_id.clone(), internal_id);

        match self.index.add(internal_id, vector.clone()) {
            Ok(false) => {}
            Ok(true) => {
                state.ids.remove(&external_id);
                warn!(
                    collection = %self.config.name,
                    internal_id,
                    "index already held new internal id, insert rolled back"
                );
                return Err(SangitaError::InternalIdCollision(internal_id));
            }
            Err(e) => {
                state.ids.remove(&external_id);
                return Err(e);
            }
        }

        let mutation = Mutation::Insert {
            external_id: &external_id,
            internal_id,
            vector: &vector,
            payload: &payload,
        };
        if let Err(e) = commit(&mutation) {
            if let Err(undo) = self.index.delete(internal_id) {
                warn!(internal_id, error = %undo, "failed to undo index insert");
            }
            state.ids.remove(&external_id);
            return Err(e);
        }

        state.payloads.insert(external_id.clone(), payload);
        debug!(collection = %self.config.name, %external_id, internal_id, "inserted vector");
        Ok(external_id)
    }

    /// Re-creates an entry with the ids it was originally assigned.
    pub(crate) fn restore(
        &self,
        external_id: String,
        internal_id: InternalId,
        values: &[f32],
        payload: P,
    ) -> Result<()> {
        let vector = self.to_vector(values)?;
        let mut state = self.state.write();
        if state.ids.internal(&external_id).is_some() || state.ids.external(internal_id).is_some()
        {
            return Err(SangitaError::InternalIdCollision(internal_id));
        }
        if self.index.add(internal_id, vector)? {
            return Err(SangitaError::InternalIdCollision(internal_id));
        }
        state.ids.insert(external_id.clone(), internal_id);
        state.payloads.insert(external_id, payload);
        state.id_counter = state.id_counter.max(internal_id);
        Ok(())
    }

    /// Returns the `k` entries most similar to `query`, best first.
    ///
    /// # Errors
    ///
    /// * `SangitaError::DimensionMismatch` - If `query.len()` differs from the collection dimension
    /// * `SangitaError::InvalidK` - If `k` is 0
    /// * `SangitaError::MissingReverseMapping` - If the index returned an id the collection does not know
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let query = self.to_vector(query)?;
        let state = self.state.read();
        self.index
            .search(&query, k)?
            .into_iter()
            .map(|result| {
                let id = state
                    .ids
                    .external(result.internal_id)
                    .ok_or(SangitaError::MissingReverseMapping(result.internal_id))?;
                Ok(SearchHit {
                    id: id.to_string(),
                    score: result.score,
                })
            })
            .collect()
    }

    /// Removes the entry with external id `id`.
    ///
    /// # Errors
    ///
    /// * `SangitaError::NotFound` - If `id` is unknown
    /// * Index errors, in which case the collection is unchanged
    pub fn delete(&self, id: &str) -> Result<()> {
        self.delete_logged(id, |_| Ok(()))
    }

    pub(crate) fn delete_logged<F>(&self, id: &str, commit: F) -> Result<()>
    where
        F: FnOnce(&Mutation<'_, P>) -> Result<()>,
    {
        let mut state = self.state.write();
        let internal_id = state
            .ids
            .internal(id)
            .ok_or_else(|| SangitaError::NotFound(id.to_string()))?;

        let previous = self.index.get(internal_id);
        self.index.delete(internal_id)?;

        if let Err(e) = commit(&Mutation::Delete {
            external_id: id,
            internal_id,
        }) {
            if let Some(vector) = previous {
                if let Err(undo) = self.index.add(internal_id, vector) {
                    warn!(internal_id, error = %undo, "failed to undo index delete");
                }
            }
            return Err(e);
        }

        state.ids.remove(id);
        state.payloads.remove(id);
        debug!(collection = %self.config.name, external_id = id, internal_id, "deleted vector");
        Ok(())
    }

    /// Replaces the vector and payload of `id`, keeping both of its ids.
    ///
    /// # Errors
    ///
    /// * `SangitaError::NotFound` - If `id` is unknown
    /// * `SangitaError::DimensionMismatch` and vector construction errors
    ///
    /// On any error the previous vector and payload remain in place.
    pub fn update(&self, id: &str, values: &[f32], payload: P) -> Result<()> {
        self.update_logged(id, values, payload, |_| Ok(()))
    }

    pub(crate) fn update_logged<F>(&self, id: &str, values: &[f32], payload: P, commit: F) -> Result<()>
    where
        F: FnOnce(&Mutation<'_, P>) -> Result<()>,
    {
        let vector = self.to_vector(values)?;
        let mut state = self.state.write();
        let internal_id = state
            .ids
            .internal(id)
            .ok_or_else(|| SangitaError::NotFound(id.to_string()))?;
        let previous = self
            .index
            .get(internal_id)
            .ok_or(SangitaError::InternalIdNotFound(internal_id))?;

        self.index.delete(internal_id)?;
        let added = self.index.add(internal_id, vector.clone());
        let replaced = matches!(added, Ok(false));
        let committed = match added {
            Ok(false) => commit(&Mutation::Update {
                external_id: id,
                internal_id,
                vector: &vector,
                payload: &payload,
            }),
            Ok(true) => Err(SangitaError::InternalIdCollision(internal_id)),
            Err(e) => Err(e),
        };
        if let Err(e) = committed {
            if replaced {
                if let Err(undo) = self.index.delete(internal_id) {
                    warn!(internal_id, error = %undo, "failed to remove replacement vector");
                }
            }
            if let Err(undo) = self.index.add(internal_id, previous) {
                warn!(internal_id, error = %undo, "failed to restore vector after update");
            }
            return Err(e);
        }

        state.payloads.insert(id.to_string(), payload);
        debug!(collection = %self.config.name, external_id = id, internal_id, "updated vector");
        Ok(())
    }

    /// Returns `true` if `id` is a live external id.
    pub fn contains(&self, id: &str) -> bool {
        self.state.read().ids.internal(id).is_some()
    }

    /// Returns the stored (normalized) vector for `id`.
    pub fn get_vector(&self, id: &str) -> Option<Vector> {
        let state = self.state.read();
        let internal_id = state.ids.internal(id)?;
        self.index.get(internal_id)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.state.read().ids.len()
    }

    /// Returns `true` if the collection holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of vectors in the backing index.
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Configuration the collection was created with.
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }
}

impl<P: Clone> Collection<P> {
    /// Returns a copy of the payload stored under `id`.
    pub fn get(&self, id: &str) -> Option<P> {
        self.state.read().payloads.get(id).cloned()
    }
}

impl<P> fmt::Debug for Collection<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
