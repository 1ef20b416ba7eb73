//! Per-source ordinal and id assignment.
//!
//! [`assign_chunks`] walks fragments in splitter order and numbers them within
//! each `(file, page)` group. It is a free function because every loader shares
//! it unchanged.

use std::collections::HashMap;

use crate::identity::{content_id, positional_id, IdentityPolicy};
use crate::models::{Chunk, Fragment};

/// File name used for fragments whose source path is empty.
const UNKNOWN_SOURCE: &str = "unknown";

/// Turn ordered fragments into chunks with ordinals and ids.
///
/// # Guarantees
///
/// - `source_file` is reduced to its basename, so the same file loaded from
///   different working directories maps to the same chunks.
/// - For a fixed `(source_file, page)`, ordinals are `0..N-1` in input order.
/// - Ids follow `policy`; the input slice is not modified.
pub fn assign_chunks(fragments: &[Fragment], policy: IdentityPolicy) -> Vec<Chunk> {
    let mut counters: HashMap<(String, i64), i64> = HashMap::new();

    fragments
        .iter()
        .map(|fragment| {
            let file = basename(&fragment.source_file);
            let counter = counters.entry((file.clone(), fragment.page)).or_insert(0);
            let ordinal = *counter;
            *counter += 1;

            let id = match policy {
                IdentityPolicy::Content => content_id(&fragment.text),
                IdentityPolicy::Positional => positional_id(&file, fragment.page, ordinal),
            };

            Chunk {
                id,
                source_file: file,
                page: fragment.page,
                ordinal,
                text: fragment.text.clone(),
            }
        })
        .collect()
}

/// Strip directories from a path, accepting both separator styles.
pub fn basename(path: &str) -> String {
    let trimmed = path.trim_end_matches(['/', '\\']);
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    if name.is_empty() {
        UNKNOWN_SOURCE.to_string()
    } else {
        name.to_string()
    }
}
