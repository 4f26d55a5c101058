// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Collection configuration.

use serde::{Deserialize, Serialize};

use crate::distance::SimilarityMetric;
use crate::error::{Result, SangitaError};
use crate::index::IndexConfig;
use crate::types::{DataType, IndexKind};

/// Immutable description of a collection.
///
/// # Examples
///
/// ```rust
/// use sangita::{CollectionConfig, DataType, IndexKind, SimilarityMetric};
///
/// let config = CollectionConfig::new("docs", 384, SimilarityMetric::Cosine, IndexKind::Linear)
///     .unwrap()
///     .with_data_type(DataType::Text)
///     .with_model_name("all-MiniLM-L6-v2")
///     .unwrap();
/// assert_eq!(config.dimension, 384);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection name (non-empty).
    pub name: String,
    /// Vector dimension (> 0).
    pub dimension: usize,
    /// Similarity metric used by the index.
    pub metric: SimilarityMetric,
    /// Index structure.
    pub index_kind: IndexKind,
    /// Source media type of the embeddings.
    pub data_type: DataType,
    /// Embedding model identifier, if recorded.
    pub model_name: Option<String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            dimension: 768,
            metric: SimilarityMetric::default(),
            index_kind: IndexKind::default(),
            data_type: DataType::default(),
            model_name: None,
        }
    }
}

impl CollectionConfig {
    /// Creates a validated configuration with default data type and no model name.
    ///
    /// # Errors
    ///
    /// * `SangitaError::InvalidCollectionName` - If `name` is empty
    /// * `SangitaError::InvalidDimension` - If `dimension` is 0
    pub fn new(
        name: impl Into<String>,
        dimension: usize,
        metric: SimilarityMetric,
        index_kind: IndexKind,
    ) -> Result<Self> {
        let config = Self {
            name: name.into(),
            dimension,
            metric,
            index_kind,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the embedding source type.
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Records the embedding model.
    ///
    /// # Errors
    ///
    /// * `SangitaError::InvalidModelName` - If `model_name` is empty
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Result<Self> {
        let model_name = model_name.into();
        if model_name.is_empty() {
            return Err(SangitaError::InvalidModelName);
        }
        self.model_name = Some(model_name);
        Ok(self)
    }

    /// Checks every field; used for configs built by struct literal or deserialized.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SangitaError::InvalidCollectionName);
        }
        if self.dimension == 0 {
            return Err(SangitaError::InvalidDimension(self.dimension));
        }
        if matches!(self.model_name.as_deref(), Some("")) {
            return Err(SangitaError::InvalidModelName);
        }
        Ok(())
    }

    /// Configuration for the backing index.
    pub fn index_config(&self) -> Result<IndexConfig> {
        IndexConfig::new(self.index_kind, self.metric, self.dimension)
    }
}
