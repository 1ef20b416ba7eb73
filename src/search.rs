//! `query` command: top-k retrieval against the vector index.
//!
//! Embeds the query with the configured provider, ranks persisted entries
//! by cosine similarity and prints each hit with its file, page and chunk
//! ordinal. With `--session`, the turn is recorded into a session snapshot;
//! `--session latest` appends to the most recently modified one.

use anyhow::{anyhow, Result};
use ragsync_core::{retrieve, ScoredEntry};

use crate::config::Config;
use crate::ingest::open_index;
use crate::sessions::{SessionStore, SourceRef};

/// Characters of entry text shown per hit.
const EXCERPT_CHARS: usize = 200;

pub async fn run_query(
    config: &Config,
    query: &str,
    k: Option<usize>,
    session: Option<&str>,
) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.top_k);
    let (index, embedder) = open_index(config).await?;
    let hits = retrieve(&index, embedder.as_ref(), query, k).await?;

    if hits.is_empty() {
        println!("No results.");
    } else {
        for (i, hit) in hits.iter().enumerate() {
            print_hit(i + 1, hit);
        }
    }

    if let Some(identifier) = session {
        let store = SessionStore::open(&config.sessions.dir)?;
        let mut session = store
            .resolve(identifier)?
            .ok_or_else(|| anyhow!("No session named '{}'", identifier))?;
        let answer = hits
            .first()
            .map(|hit| hit.entry.metadata.text.clone())
            .unwrap_or_default();
        session.record_turn(query, answer, hits.iter().map(SourceRef::from).collect());
        session.save()?;
        println!("Recorded in session {}", session.id);
    }

    Ok(())
}

fn print_hit(rank: usize, hit: &ScoredEntry) {
    let meta = &hit.entry.metadata;
    println!(
        "{}. [{:.3}] {} (page {}, chunk {})",
        rank, hit.score, meta.file, meta.page, meta.chunk
    );
    println!("    excerpt: \"{}\"", excerpt(&meta.text, EXCERPT_CHARS));
    println!("    id: {}", hit.entry.id);
    println!();
}

/// First `max_chars` characters of `text` on one line, with `...` when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_short_text_unchanged() {
        assert_eq!(excerpt("hello  world\n", 200), "hello world");
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let text = "é".repeat(300);
        let out = excerpt(&text, 200);
        assert_eq!(out.chars().count(), 203);
        assert!(out.ends_with("..."));
    }
}
