//! In-memory [`VectorIndex`] for tests and embedding-free tooling.
//!
//! Entries live in a `BTreeMap` behind `std::sync::RwLock`. Query is
//! brute-force cosine similarity over every stored vector.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::{Chunk, EntryMetadata, IndexEntry, ScoredEntry};

use super::{check_vector_count, check_vector_dims, DeleteOutcome, StoreError, VectorIndex};

/// In-memory index keyed by chunk id.
pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<BTreeMap<String, IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Snapshot of a single entry.
    pub fn get(&self, id: &str) -> Option<IndexEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.keys().cloned().collect())
    }

    async fn insert(&self, chunks: &[Chunk]) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| StoreError::Embedding(e.to_string()))?;
        check_vector_count(chunks.len(), vectors.len())?;
        check_vector_dims(self.embedder.dims(), &vectors)?;

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            entries.insert(
                chunk.id.clone(),
                IndexEntry {
                    id: chunk.id.clone(),
                    vector,
                    metadata: EntryMetadata::from(chunk),
                },
            );
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<ScoredEntry> = entries
            .values()
            .map(|entry| ScoredEntry {
                score: cosine_similarity(vector, &entry.vector),
                entry: entry.clone(),
            })
            .collect();
        sort_by_score(&mut scored);
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().unwrap_or_else(|e| e.into_inner()).len())
    }

    async fn delete(&self) -> Result<DeleteOutcome, StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.is_empty() {
            tracing::warn!("in-memory vector index is already empty");
            return Ok(DeleteOutcome::Missing);
        }
        entries.clear();
        Ok(DeleteOutcome::Deleted)
    }
}

/// Sort best-first; ties broken by id so results are stable.
pub fn sort_by_score(scored: &mut [ScoredEntry]) {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
}


#[cfg(test)]
mod tests {
    use super::test_support::KeywordEmbedder;
    use super::*;
    use crate::identity::IdentityPolicy;
    use crate::models::Fragment;

    fn index() -> InMemoryIndex {
        InMemoryIndex::new(Arc::new(KeywordEmbedder))
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        let fragments: Vec<Fragment> = texts.iter().map(|t| Fragment::new(*t, "a.txt", 0)).collect();
        crate::assign::assign_chunks(&fragments, IdentityPolicy::Content)
    }

    #[tokio::test]
    async fn test_empty_index_has_no_ids() {
        let idx = index();
        assert!(idx.existing_ids().await.unwrap().is_empty());
        assert_eq!(idx.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_is_last_write_wins() {
        let idx = index();
        let mut batch = chunks(&["rust search"]);
        idx.insert(&batch).await.unwrap();
        batch[0].page = 42;
        idx.insert(&batch).await.unwrap();

        assert_eq!(idx.len().await.unwrap(), 1);
        assert_eq!(idx.get(&batch[0].id).unwrap().metadata.page, 42);
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let idx = index();
        idx.insert(&chunks(&["rust memory", "python music", "rust database"]))
            .await
            .unwrap();
        let q = KeywordEmbedder.embed_one("rust database").await.unwrap();
        let hits = idx.query(&q, 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.metadata.text, "rust database");
        assert_eq!(hits[1].entry.metadata.text, "rust memory");
    }

    #[tokio::test]
    async fn test_delete_reports_missing_when_empty() {
        let idx = index();
        assert_eq!(idx.delete().await.unwrap(), DeleteOutcome::Missing);
        idx.insert(&chunks(&["x"])).await.unwrap();
        assert_eq!(idx.delete().await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(idx.len().await.unwrap(), 0);
    }
}
