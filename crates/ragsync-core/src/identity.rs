//! Chunk identity.
//!
//! Two identity policies exist and they are mutually incompatible for change
//! detection: an index built under one policy reports every chunk as new when
//! synced under the other. A store records the policy it was built with and
//! refuses to open under a different one; switching policy means rebuilding
//! the index from scratch.
//!
//! # Example
//!
//! ```rust
//! use ragsync_core::identity::{content_id, positional_id};
//!
//! assert_eq!(content_id("abc"), content_id("abc"));
//! assert_eq!(positional_id("guide.pdf", 3, 0), "guide.pdf:3:0");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How chunk ids are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityPolicy {
    /// SHA-256 of the chunk text. Identical text from different files or
    /// pages collapses to a single stored entry.
    #[default]
    Content,
    /// `file:page:ordinal`. Stable across content edits, but edited chunks are
    /// never re-embedded.
    Positional,
}

impl IdentityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityPolicy::Content => "content",
            IdentityPolicy::Positional => "positional",
        }
    }
}

impl fmt::Display for IdentityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content" => Ok(IdentityPolicy::Content),
            "positional" => Ok(IdentityPolicy::Positional),
            other => Err(format!(
                "unknown identity policy '{}': expected content or positional",
                other
            )),
        }
    }
}

/// Content-addressed id: lowercase hex SHA-256 of the raw text bytes.
///
/// Depends on nothing but `text`, so it is stable across runs, processes and
/// machines. The empty string has a valid id.
pub fn content_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Positional id: `file:page:ordinal`.
pub fn positional_id(source_file: &str, page: i64, ordinal: i64) -> String {
    format!("{}:{}:{}", source_file, page, ordinal)
}
