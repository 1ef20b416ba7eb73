//! Incremental synchronization of candidate chunks into a vector index.
//!
//! Every ingestion run re-derives the full candidate chunk set. The
//! coordinator diffs those candidates against the ids already persisted and
//! inserts only the delta, so repeated runs over unchanged sources are no-ops.
//!
//! # Degrade-to-empty
//!
//! When the persisted ids cannot be read (corrupt or unreadable index), the
//! coordinator assumes the index is empty. That over-inserts instead of
//! silently skipping data; inserts are last-write-wins at the index layer, so
//! re-inserting a present id is harmless. Failures of the insert itself are
//! returned to the caller.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};

use crate::models::{Chunk, SyncReport};
use crate::store::VectorIndex;

/// Diffs candidate chunks against a [`VectorIndex`] and applies the delta.
pub struct SyncCoordinator<'a> {
    index: &'a dyn VectorIndex,
}

/// Candidates split by whether the index already holds their id.
struct Delta {
    to_insert: Vec<Chunk>,
    skipped: usize,
}

impl<'a> SyncCoordinator<'a> {
    pub fn new(index: &'a dyn VectorIndex) -> Self {
        Self { index }
    }

    /// Persisted ids, or the empty set when they cannot be read.
    ///
    /// The boolean is true when the read failed.
    async fn existing_ids_or_empty(&self) -> (HashSet<String>, bool) {
        match self.index.existing_ids().await {
            Ok(ids) => (ids, false),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "could not read existing ids; assuming an empty index and re-inserting all candidates"
                );
                (HashSet::new(), true)
            }
        }
    }

    /// True iff at least one candidate id is absent from the index.
    ///
    /// Reads the same id set [`sync`](Self::sync) acts on and never writes.
    pub async fn needs_update(&self, candidates: &[Chunk]) -> bool {
        if candidates.is_empty() {
            return false;
        }
        let (existing, _) = self.existing_ids_or_empty().await;
        candidates.iter().any(|c| !existing.contains(&c.id))
    }

    /// What [`sync`](Self::sync) would do, without writing.
    pub async fn plan(&self, candidates: &[Chunk]) -> SyncReport {
        if candidates.is_empty() {
            return SyncReport::default();
        }
        let (existing, degraded) = self.existing_ids_or_empty().await;
        let delta = partition(candidates, &existing);
        SyncReport {
            added: delta.to_insert.len(),
            skipped: delta.skipped,
            degraded,
        }
    }

    /// Insert every candidate whose id is not yet persisted.
    ///
    /// Candidates sharing an id are inserted once. A run with nothing to
    /// insert does not touch the index.
    pub async fn sync(&self, candidates: &[Chunk]) -> Result<SyncReport> {
        if candidates.is_empty() {
            return Ok(SyncReport::default());
        }

        let (existing, degraded) = self.existing_ids_or_empty().await;
        let delta = partition(candidates, &existing);

        if delta.to_insert.is_empty() {
            tracing::info!(skipped = delta.skipped, "vector index already up to date");
            return Ok(SyncReport {
                added: 0,
                skipped: delta.skipped,
                degraded,
            });
        }

        tracing::info!(
            new = delta.to_insert.len(),
            skipped = delta.skipped,
            "adding new chunks to vector index"
        );
        self.index
            .insert(&delta.to_insert)
            .await
            .context("Failed to insert chunks into vector index")?;

        Ok(SyncReport {
            added: delta.to_insert.len(),
            skipped: delta.skipped,
            degraded,
        })
    }
}

/// Split candidates into new (deduplicated by id, first occurrence wins) and
/// already-present.
fn partition(candidates: &[Chunk], existing: &HashSet<String>) -> Delta {
    let mut to_insert: Vec<Chunk> = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut skipped = 0;

    for chunk in candidates {
        if existing.contains(&chunk.id) {
            skipped += 1;
            continue;
        }
        match seen.get(chunk.id.as_str()) {
            Some(&first) => {
                let kept = &to_insert[first];
                if kept.text != chunk.text {
                    tracing::warn!(
                        id = %chunk.id,
                        kept = %format!("{}:{}:{}", kept.source_file, kept.page, kept.ordinal),
                        dropped = %format!("{}:{}:{}", chunk.source_file, chunk.page, chunk.ordinal),
                        "identity collision: distinct text shares one id; keeping the first"
                    );
                }
            }
            None => {
                seen.insert(chunk.id.as_str(), to_insert.len());
                to_insert.push(chunk.clone());
            }
        }
    }

    Delta { to_insert, skipped }
}
