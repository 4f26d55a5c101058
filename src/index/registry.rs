// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Shared index instances keyed by configuration.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{DefaultIndexFactory, IndexConfig, IndexFactory, VectorIndex};
use crate::error::Result;

/// Thin cache that hands out one shared index per [`IndexConfig`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use sangita::index::{IndexConfig, IndexRegistry};
/// use sangita::{IndexKind, SimilarityMetric};
///
/// let registry = IndexRegistry::default();
/// let config = IndexConfig::new(IndexKind::Linear, SimilarityMetric::Dot, 8).unwrap();
///
/// let a = registry.get_or_create(config).unwrap();
/// let b = registry.get_or_create(config).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub struct IndexRegistry {
    factory: Box<dyn IndexFactory>,
    indexes: RwLock<HashMap<IndexConfig, Arc<dyn VectorIndex>>>,
}

impl IndexRegistry {
    /// Creates an empty registry that builds indexes with `factory`.
    pub fn new(factory: Box<dyn IndexFactory>) -> Self {
        Self {
            factory,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the index for `config`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Propagates the factory's error; nothing is cached on failure.
    pub fn get_or_create(&self, config: IndexConfig) -> Result<Arc<dyn VectorIndex>> {
        if let Some(index) = self.indexes.read().get(&config) {
            return Ok(Arc::clone(index));
        }

        let mut indexes = self.indexes.write();
        // Another caller may have created it between the two locks.
        if let Some(index) = indexes.get(&config) {
            return Ok(Arc::clone(index));
        }
        let index: Arc<dyn VectorIndex> = Arc::from(self.factory.create_index(config)?);
        indexes.insert(config, Arc::clone(&index));
        Ok(index)
    }

    /// Number of cached indexes.
    pub fn len(&self) -> usize {
        self.indexes.read().len()
    }

    /// Returns `true` if no index has been created yet.
    pub fn is_empty(&self) -> bool {
        self.indexes.read().is_empty()
    }
}

impl Default for IndexRegistry {
    fn default() -> Self {
        Self::new(Box::new(DefaultIndexFactory))
    }
}
