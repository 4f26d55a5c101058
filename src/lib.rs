// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! # Sangita
//!
//! The storage core of an embedded vector database.
//!
//! Sangita stores fixed-dimension embeddings in named collections, answers
//! top-k similarity queries, and records every mutation in a segmented,
//! checksummed write-ahead log so a collection survives a crash.
//!
//! ## Features
//!
//! - **Normalized vectors** - [`Vector`] validates and L2-normalizes on construction
//! - **Three metrics** - Cosine, dot product, and negated squared Euclidean ([`distance`])
//! - **Pluggable indexes** - [`index::VectorIndex`] trait with an exact [`index::LinearIndex`]
//! - **Collections** - UUID external ids over compact internal ids, with rollback on failure
//! - **Write-ahead log** - Segments, LSNs, CRC-32 records, torn-tail repair ([`wal`])
//! - **Durable collections** - [`DurableCollection`] logs every mutation and replays on open
//! - **Thread-safe** - Every type takes `&self` and locks internally
//!
//! ## Architecture
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Vector`] | Immutable unit-length embedding |
//! | [`SimilarityMetric`] | Scoring function (higher = more similar) |
//! | [`index::IndexFactory`] | Builds an index from an [`index::IndexConfig`] |
//! | [`index::IndexRegistry`] | Shares one index per configuration |
//! | [`Collection`] | Id mapping, payloads, and search over one index |
//! | [`Wal`] | Append-only log with recovery and replay |
//! | [`DurableCollection`] | [`Collection`] + [`Wal`] |
//!
//! ## Quick Start
//!
//! ```rust
//! use sangita::{
//!     CollectionConfig, DurableCollection, IndexKind, Result, SimilarityMetric, WalConfig,
//! };
//!
//! fn main() -> Result<()> {
//!     let dir = tempfile::tempdir()?;
//!     let config = CollectionConfig::new("docs", 3, SimilarityMetric::Cosine, IndexKind::Linear)?;
//!     let docs = DurableCollection::<String>::open(config, dir.path(), WalConfig::default())?;
//!
//!     let id = docs.insert(&[1.0, 0.0, 0.0], "hello".to_string())?;
//!     docs.insert(&[0.0, 1.0, 0.0], "world".to_string())?;
//!
//!     let hits = docs.search(&[0.9, 0.1, 0.0], 1)?;
//!     assert_eq!(hits[0].id, id);
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Sangita emits [`tracing`] events (collection lifecycle at `info`, torn
//! records and rollbacks at `warn`, per-record activity at `debug`). Install
//! any subscriber to see them.

#![warn(missing_docs)]

pub mod collection;
pub mod distance;
pub mod error;
pub mod index;
pub mod types;
pub mod vector;
pub mod wal;

// Re-export commonly used types
pub use collection::{Collection, CollectionConfig, DurableCollection, SearchHit};
pub use distance::SimilarityMetric;
pub use error::{Result, SangitaError};
pub use types::{DataType, IndexKind, InternalId};
pub use vector::Vector;

// Re-export log types
pub use wal::{LogRecord, Operation, ReplayStats, SyncPolicy, Wal, WalConfig};
