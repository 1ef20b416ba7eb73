//! # ragsync
//!
//! Incremental document ingestion into a persistent vector index.
//!
//! Documents are loaded, split into chunks, and every chunk receives an id
//! derived from its content. Each `update` diffs the freshly derived chunk
//! ids against the ids already in the index and embeds only the new ones, so
//! re-running over unchanged sources costs nothing and identical text that
//! appears in several files is stored once.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Loaders  │──▶│ Splitter │──▶│ Chunk ids    │──▶│ Sync        │
//! │ PDF/JSON │   │          │   │ (SHA-256)    │   │ coordinator │
//! └──────────┘   └──────────┘   └──────────────┘   └──────┬──────┘
//!                                                         ▼
//!                                 ┌──────────┐     ┌─────────────┐
//!                                 │ Retriever│◀────│ SQLite index│
//!                                 └──────────┘     └─────────────┘
//! ```
//!
//! The identity, assignment, sync and retrieval logic lives in
//! `ragsync-core`; this crate supplies configuration, loaders, embedding
//! providers, the SQLite-backed index and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`embedding`] | Embedding providers |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`loader`] | Document loaders |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema |
//! | [`sqlite_index`] | Directory-backed vector index |
//! | [`ingest`] | `update`, `delete`, `status` commands |
//! | [`search`] | `query` command |
//! | [`sessions`] | Session snapshots |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod search;
pub mod sessions;
pub mod sqlite_index;
