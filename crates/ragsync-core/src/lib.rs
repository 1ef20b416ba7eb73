//! # ragsync core
//!
//! Storage-agnostic logic for ragsync: chunk data models, content-addressed
//! identity, per-source chunk assignment, the text splitter, the embedding
//! trait, the vector index abstraction, and the incremental sync coordinator.
//!
//! This crate contains no SQL, HTTP, or filesystem I/O. Persistent indexes and
//! concrete embedding providers live in the `ragsync` app crate.
//!
//! ```text
//! fragments ──▶ assign_chunks ──▶ SyncCoordinator ──▶ VectorIndex
//!                  (ids)         (diff + dedup)       (insert delta)
//! ```

pub mod assign;
pub mod chunk;
pub mod embedding;
pub mod identity;
pub mod models;
pub mod search;
pub mod store;
pub mod sync;

pub use assign::assign_chunks;
pub use identity::{content_id, positional_id, IdentityPolicy};
pub use models::{Chunk, EntryMetadata, Fragment, IndexEntry, ScoredEntry, SyncReport};
pub use search::retrieve;
pub use store::{DeleteOutcome, StoreError, VectorIndex};
pub use sync::SyncCoordinator;
