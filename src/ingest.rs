//! Index maintenance commands.
//!
//! `update` runs the full pipeline on every invocation:
//!
//! ```text
//! loader → splitter → chunk ids → needs_update? → sync (insert delta only)
//! ```
//!
//! Candidate chunks are re-derived from the sources each time; only chunks
//! whose ids are absent from the index are embedded and written.

use std::sync::Arc;

use anyhow::{Context, Result};
use ragsync_core::chunk::split_fragments;
use ragsync_core::embedding::Embedder;
use ragsync_core::{assign_chunks, Chunk, DeleteOutcome, SyncCoordinator, VectorIndex};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::loader::create_loader;
use crate::sqlite_index::{remove_index_dir, SqliteIndex};

/// Open the configured index together with the embedder it uses.
pub async fn open_index(config: &Config) -> Result<(SqliteIndex, Arc<dyn Embedder>)> {
    let embedder = create_embedder(&config.embedding)?;
    let index = SqliteIndex::open(
        &config.index.path,
        Arc::clone(&embedder),
        config.index.identity,
        config.embedding.batch_size,
    )
    .await
    .with_context(|| format!("Failed to open vector index at {}", config.index.path.display()))?;
    Ok((index, embedder))
}

/// Load, split and identify every chunk of the configured sources.
pub fn build_candidates(config: &Config) -> Result<Vec<Chunk>> {
    let loader = create_loader(&config.data)?;
    let fragments = loader
        .load()
        .with_context(|| format!("Failed to load documents from {}", config.data.path.display()))?;
    let pieces = split_fragments(&fragments, config.chunking.size, config.chunking.overlap);
    let chunks = assign_chunks(&pieces, config.index.identity);

    tracing::info!(
        fragments = fragments.len(),
        chunks = chunks.len(),
        "prepared candidate chunks"
    );
    Ok(chunks)
}

pub async fn run_update(config: &Config, reset: bool, dry_run: bool) -> Result<()> {
    if reset && !dry_run && remove_index_dir(&config.index.path)? == DeleteOutcome::Deleted {
        println!("Removed existing index at {}", config.index.path.display());
    }

    let candidates = build_candidates(config)?;
    let (index, _) = open_index(config).await?;
    let coordinator = SyncCoordinator::new(&index);

    if dry_run {
        let plan = coordinator.plan(&candidates).await;
        println!("update (dry-run)");
        println!("  chunks: {}", candidates.len());
        println!("  would add: {}", plan.added);
        println!("  already indexed: {}", plan.skipped);
        if reset {
            println!("  (--reset ignored in dry-run)");
        }
        return Ok(());
    }

    if !coordinator.needs_update(&candidates).await {
        println!(
            "Vector index already up to date ({} chunks)",
            candidates.len()
        );
        return Ok(());
    }

    let report = coordinator.sync(&candidates).await?;

    println!("update ok");
    println!("  chunks: {}", candidates.len());
    println!("  added: {}", report.added);
    println!("  skipped: {}", report.skipped);
    if report.degraded {
        println!("  existing index was unreadable; all chunks were re-inserted");
    }

    Ok(())
}

/// Delete the index directory. A missing index is not an error.
pub fn run_delete(config: &Config) -> Result<()> {
    match remove_index_dir(&config.index.path)
        .with_context(|| format!("Failed to delete {}", config.index.path.display()))?
    {
        DeleteOutcome::Deleted => {
            println!("Deleted vector index at {}", config.index.path.display())
        }
        DeleteOutcome::Missing => {
            println!("No vector index at {}", config.index.path.display())
        }
    }
    Ok(())
}

pub async fn run_status(config: &Config) -> Result<()> {
    let (index, embedder) = open_index(config).await?;
    let entries = index.len().await?;
    let recorded = index.recorded_model().await?;

    println!("Vector index: {}", index.dir().display());
    println!("  present: {}", if index.dir().exists() { "yes" } else { "no" });
    println!("  identity: {}", index.policy());
    println!(
        "  model: {}",
        recorded.as_deref().unwrap_or(embedder.model_name())
    );
    println!("  dims: {}", embedder.dims());
    println!("  entries: {}", entries);

    Ok(())
}
