//! Data types that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Page number used when the loader cannot attribute text to a page.
pub const UNKNOWN_PAGE: i64 = -1;

/// A piece of source text as produced by a loader and the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub source_file: String,
    pub page: i64,
}

impl Fragment {
    pub fn new(text: impl Into<String>, source_file: impl Into<String>, page: i64) -> Self {
        Self {
            text: text.into(),
            source_file: source_file.into(),
            page,
        }
    }
}

/// A fragment with positional metadata and a stable identifier.
///
/// Chunks are re-derived on every ingestion run and never persisted on their
/// own; only the [`IndexEntry`] built from them is durable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    /// Basename of the originating file.
    pub source_file: String,
    pub page: i64,
    /// 0-based position within `(source_file, page)`.
    pub ordinal: i64,
    pub text: String,
}

/// Metadata persisted alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub file: String,
    pub page: i64,
    pub chunk: i64,
    pub text: String,
}

impl From<&Chunk> for EntryMetadata {
    fn from(chunk: &Chunk) -> Self {
        Self {
            file: chunk.source_file.clone(),
            page: chunk.page,
            chunk: chunk.ordinal,
            text: chunk.text.clone(),
        }
    }
}

/// A persisted record inside a vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// A retrieval hit: an entry and its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    pub score: f32,
}

/// Outcome of [`SyncCoordinator::sync`](crate::sync::SyncCoordinator::sync).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Distinct chunks written to the index.
    pub added: usize,
    /// Candidates whose id was already persisted.
    pub skipped: usize,
    /// True when the existing ids could not be read and the run assumed an
    /// empty index.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_metadata_from_chunk() {
        let chunk = Chunk {
            id: "abc".to_string(),
            source_file: "manual.pdf".to_string(),
            page: 4,
            ordinal: 2,
            text: "torque settings".to_string(),
        };
        let meta = EntryMetadata::from(&chunk);
        assert_eq!(meta.file, "manual.pdf");
        assert_eq!(meta.page, 4);
        assert_eq!(meta.chunk, 2);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "file": "manual.pdf",
                "page": 4,
                "chunk": 2,
                "text": "torque settings"
            })
        );
    }
}
