//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only view the sync coordinator and the
//! retriever have of persisted embeddings, so backends are pluggable (SQLite
//! directory index in the app crate, [`memory::InMemoryIndex`] here).
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`existing_ids`](VectorIndex::existing_ids) | Every id currently persisted |
//! | [`insert`](VectorIndex::insert) | Embed and persist chunks, last write wins |
//! | [`query`](VectorIndex::query) | Top-k entries by cosine similarity |
//! | [`len`](VectorIndex::len) | Number of persisted entries |
//! | [`delete`](VectorIndex::delete) | Remove the whole index |
//!
//! Concurrent writers against one index are not supported. Callers serialise
//! `insert` per index location.

pub mod memory;

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::identity::IdentityPolicy;
use crate::models::{Chunk, ScoredEntry};

/// Errors raised by vector index backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Something exists at the index location but cannot be opened or read
    /// as an index.
    #[error(
        "vector index at {path} is unavailable: {reason}; \
         remove it with `ragsync delete` or rebuild it with `ragsync update --reset`"
    )]
    Unavailable { path: PathBuf, reason: String },

    #[error(
        "vector index was built with identity policy '{recorded}' but '{configured}' is configured; \
         rebuild it with `ragsync update --reset`"
    )]
    PolicyMismatch {
        recorded: IdentityPolicy,
        configured: IdentityPolicy,
    },

    #[error(
        "vector index was built with embedding model '{recorded}' but '{configured}' is configured; \
         rebuild it with `ragsync update --reset`"
    )]
    ModelMismatch { recorded: String, configured: String },

    #[error(
        "vector index was built with {recorded}-dimensional vectors but the embedder \
         produces {configured}; rebuild it with `ragsync update --reset`"
    )]
    DimsMismatch { recorded: usize, configured: usize },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("embedding returned {got} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("embedder returned a {got}-dimensional vector, expected {expected}")]
    EmbeddingDims { expected: usize, got: usize },

    #[error("index backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result of [`VectorIndex::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing was persisted; the desired end state already held.
    Missing,
}

/// Abstract persistent embedding index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// All ids currently persisted. A fresh or absent index yields the empty
    /// set, not an error.
    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError>;

    /// Embed every chunk's text and persist `(id, vector, metadata)`.
    ///
    /// An id that is already present is overwritten.
    async fn insert(&self, chunks: &[Chunk]) -> Result<(), StoreError>;

    /// The `k` entries most similar to `vector`, best first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, StoreError>;

    /// Number of persisted entries.
    async fn len(&self) -> Result<usize, StoreError>;

    /// Remove all persisted data.
    async fn delete(&self) -> Result<DeleteOutcome, StoreError>;
}

/// Check that an embedder returned one vector per text.
pub fn check_vector_count(expected: usize, got: usize) -> Result<(), StoreError> {
    if expected == got {
        Ok(())
    } else {
        Err(StoreError::EmbeddingCount { expected, got })
    }
}

/// Check that every vector has the embedder's declared dimensionality.
pub fn check_vector_dims(expected: usize, vectors: &[Vec<f32>]) -> Result<(), StoreError> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(bad) => Err(StoreError::EmbeddingDims {
            expected,
            got: bad.len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_vector_dims() {
        assert!(check_vector_dims(2, &[vec![0.0, 1.0], vec![1.0, 0.0]]).is_ok());
        let err = check_vector_dims(2, &[vec![0.0, 1.0], vec![1.0]]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::EmbeddingDims {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn test_unavailable_message_suggests_recovery() {
        let err = StoreError::Unavailable {
            path: PathBuf::from("./vector_db"),
            reason: "file is not a database".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("file is not a database"));
        assert!(msg.contains("ragsync update --reset"));
        assert!(msg.contains("ragsync delete"));
    }
}
