//! Retrieval over a [`VectorIndex`].
//!
//! The answering chain consumes the top-k entries and their metadata; this
//! module only embeds the query and ranks persisted entries.

use anyhow::{Context, Result};

use crate::embedding::Embedder;
use crate::models::ScoredEntry;
use crate::store::VectorIndex;

/// Default number of entries returned per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Embed `query` and return the `k` nearest entries, best first.
///
/// A blank query returns no results without calling the embedder.
pub async fn retrieve(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredEntry>> {
    if query.trim().is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    let vector = embedder
        .embed_one(query)
        .await
        .context("Failed to embed query")?;
    let hits = index
        .query(&vector, k)
        .await
        .context("Failed to query vector index")?;
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::assign::assign_chunks;
    use crate::identity::IdentityPolicy;
    use crate::models::Fragment;
    use crate::store::memory::test_support::KeywordEmbedder;
    use crate::store::memory::InMemoryIndex;

    #[tokio::test]
    async fn test_retrieve_returns_best_matches() {
        let index = InMemoryIndex::new(Arc::new(KeywordEmbedder));
        let fragments = vec![
            Fragment::new("rust memory safety", "a.pdf", 0),
            Fragment::new("python music tools", "b.pdf", 1),
            Fragment::new("database search", "c.pdf", 2),
        ];
        index
            .insert(&assign_chunks(&fragments, IdentityPolicy::Content))
            .await
            .unwrap();

        let hits = retrieve(&index, &KeywordEmbedder, "search the database", 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.metadata.file, "c.pdf");
        assert_eq!(hits[0].entry.metadata.page, 2);
    }

    #[tokio::test]
    async fn test_blank_query_returns_nothing() {
        let index = InMemoryIndex::new(Arc::new(KeywordEmbedder));
        assert!(retrieve(&index, &KeywordEmbedder, "   ", 3)
            .await
            .unwrap()
            .is_empty());
    }
}
