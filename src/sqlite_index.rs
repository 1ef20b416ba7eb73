//! Directory-backed [`VectorIndex`] on SQLite.
//!
//! An index lives at `<index.path>/index.sqlite`. The directory is created on
//! the first insert, so opening a path that does not exist yet is not an
//! error. The identity policy, embedding model and vector dimensionality are
//! recorded in `index_meta` on first write and checked on every open.
//!
//! Query is brute-force cosine similarity over every stored vector.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use ragsync_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use ragsync_core::models::{Chunk, EntryMetadata, IndexEntry, ScoredEntry};
use ragsync_core::store::memory::sort_by_score;
use ragsync_core::store::{
    check_vector_count, check_vector_dims, DeleteOutcome, StoreError, VectorIndex,
};
use ragsync_core::IdentityPolicy;

use crate::db;
use crate::migrate;

/// File name of the database inside the index directory.
pub const INDEX_FILE: &str = "index.sqlite";

const META_IDENTITY: &str = "identity_policy";
const META_MODEL: &str = "embedding_model";
const META_DIMS: &str = "embedding_dims";

pub struct SqliteIndex {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    policy: IdentityPolicy,
    batch_size: usize,
    /// `None` until the database file exists.
    pool: Mutex<Option<SqlitePool>>,
}

impl SqliteIndex {
    /// Open the index at `dir`.
    ///
    /// Fails with [`StoreError::Unavailable`] when `dir` is not a directory
    /// or holds something that is not a SQLite database, and with a mismatch
    /// error when the index was built under a different identity policy or
    /// embedding model.
    pub async fn open(
        dir: &Path,
        embedder: Arc<dyn Embedder>,
        policy: IdentityPolicy,
        batch_size: usize,
    ) -> Result<Self, StoreError> {
        let index = Self {
            dir: dir.to_path_buf(),
            embedder,
            policy,
            batch_size: batch_size.max(1),
            pool: Mutex::new(None),
        };

        if !dir.exists() {
            return Ok(index);
        }
        if !dir.is_dir() {
            return Err(index.unavailable("path exists but is not a directory"));
        }

        let db_path = index.db_path();
        if !db_path.exists() {
            return Ok(index);
        }

        let pool = db::connect(&db_path, false)
            .await
            .map_err(|e| index.unavailable(e))?;
        // Forces SQLite to read the header; a non-database file fails here.
        sqlx::query("SELECT COUNT(*) FROM sqlite_master")
            .fetch_one(&pool)
            .await
            .map_err(|e| index.unavailable(e))?;

        index.check_meta(&pool).await?;
        *index.pool.lock().await = Some(pool);
        Ok(index)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> IdentityPolicy {
        self.policy
    }

    /// Embedding model recorded in the index, if any write has happened.
    pub async fn recorded_model(&self) -> Result<Option<String>, StoreError> {
        let Some(pool) = self.current_pool().await else {
            return Ok(None);
        };
        if !migrate::table_exists(&pool, "index_meta").await.map_err(backend)? {
            return Ok(None);
        }
        read_meta(&pool, META_MODEL).await.map_err(backend)
    }

    fn db_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn unavailable(&self, reason: impl ToString) -> StoreError {
        StoreError::Unavailable {
            path: self.dir.clone(),
            reason: reason.to_string(),
        }
    }

    async fn current_pool(&self) -> Option<SqlitePool> {
        self.pool.lock().await.clone()
    }

    async fn check_meta(&self, pool: &SqlitePool) -> Result<(), StoreError> {
        // A database without the meta table has never been written by us;
        // the first insert records the configuration.
        if !migrate::table_exists(pool, "index_meta")
            .await
            .map_err(|e| self.unavailable(e))?
        {
            return Ok(());
        }

        if let Some(recorded) = read_meta(pool, META_IDENTITY)
            .await
            .map_err(|e| self.unavailable(e))?
        {
            let recorded: IdentityPolicy = recorded.parse().map_err(|e: String| {
                self.unavailable(format!("corrupt identity policy in index: {}", e))
            })?;
            if recorded != self.policy {
                return Err(StoreError::PolicyMismatch {
                    recorded,
                    configured: self.policy,
                });
            }
        }

        if let Some(recorded) = read_meta(pool, META_MODEL)
            .await
            .map_err(|e| self.unavailable(e))?
        {
            if recorded != self.embedder.model_name() {
                return Err(StoreError::ModelMismatch {
                    recorded,
                    configured: self.embedder.model_name().to_string(),
                });
            }
        }

        if let Some(recorded) = read_meta(pool, META_DIMS)
            .await
            .map_err(|e| self.unavailable(e))?
        {
            let recorded: usize = recorded.parse().map_err(|_| {
                self.unavailable(format!("corrupt embedding dims in index: '{}'", recorded))
            })?;
            if recorded != self.embedder.dims() {
                return Err(StoreError::DimsMismatch {
                    recorded,
                    configured: self.embedder.dims(),
                });
            }
        }

        Ok(())
    }

    /// Pool for writing: creates the directory, database and schema as needed.
    async fn writable_pool(&self) -> Result<SqlitePool, StoreError> {
        let mut guard = self.pool.lock().await;
        let pool = match guard.as_ref() {
            Some(pool) => pool.clone(),
            None => {
                std::fs::create_dir_all(&self.dir)?;
                let pool = db::connect(&self.db_path(), true)
                    .await
                    .map_err(|e| self.unavailable(e))?;
                *guard = Some(pool.clone());
                pool
            }
        };
        drop(guard);

        migrate::run_migrations(&pool).await.map_err(backend)?;

        for (key, value) in [
            (META_IDENTITY, self.policy.as_str().to_string()),
            (META_MODEL, self.embedder.model_name().to_string()),
            (META_DIMS, self.embedder.dims().to_string()),
        ] {
            sqlx::query("INSERT OR IGNORE INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&pool)
                .await
                .map_err(backend)?;
        }

        Ok(pool)
    }

    async fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, StoreError> {
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self
                .embedder
                .embed(&texts)
                .await
                .map_err(|e| StoreError::Embedding(e.to_string()))?;
            check_vector_count(batch.len(), embedded.len())?;
            check_vector_dims(self.embedder.dims(), &embedded)?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

fn backend(e: impl ToString) -> StoreError {
    StoreError::Backend(e.to_string())
}

async fn read_meta(pool: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        let Some(pool) = self.current_pool().await else {
            return Ok(HashSet::new());
        };

        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM entries")
            .fetch_all(&pool)
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(ids.into_iter().collect())
    }

    async fn insert(&self, chunks: &[Chunk]) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        // Embed before opening the transaction so a provider failure leaves
        // the index untouched.
        let vectors = self.embed_all(chunks).await?;
        let pool = self.writable_pool().await?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = pool.begin().await.map_err(backend)?;
        for (chunk, vector) in chunks.iter().zip(&vectors) {
            sqlx::query(
                r#"
                INSERT INTO entries (id, file, page, ordinal, text, vector, dims, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    file = excluded.file,
                    page = excluded.page,
                    ordinal = excluded.ordinal,
                    text = excluded.text,
                    vector = excluded.vector,
                    dims = excluded.dims,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.source_file)
            .bind(chunk.page)
            .bind(chunk.ordinal)
            .bind(&chunk.text)
            .bind(vec_to_blob(vector))
            .bind(vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        tracing::debug!(count = chunks.len(), dir = %self.dir.display(), "persisted entries");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, StoreError> {
        let Some(pool) = self.current_pool().await else {
            return Ok(Vec::new());
        };
        if k == 0 || !migrate::table_exists(&pool, "entries").await.map_err(backend)? {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT id, file, page, ordinal, text, vector FROM entries")
            .fetch_all(&pool)
            .await
            .map_err(backend)?;

        let mut scored: Vec<ScoredEntry> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                let stored = blob_to_vec(&blob);
                ScoredEntry {
                    score: cosine_similarity(vector, &stored),
                    entry: IndexEntry {
                        id: row.get("id"),
                        vector: stored,
                        metadata: EntryMetadata {
                            file: row.get("file"),
                            page: row.get("page"),
                            chunk: row.get("ordinal"),
                            text: row.get("text"),
                        },
                    },
                }
            })
            .collect();

        sort_by_score(&mut scored);
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let Some(pool) = self.current_pool().await else {
            return Ok(0);
        };
        if !migrate::table_exists(&pool, "entries").await.map_err(backend)? {
            return Ok(0);
        }
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&pool)
            .await
            .map_err(backend)?;
        Ok(count as usize)
    }

    async fn delete(&self) -> Result<DeleteOutcome, StoreError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
        }

        remove_index_dir(&self.dir)
    }
}

/// Remove the index directory at `dir` without opening it.
///
/// Works on indexes that cannot be opened under the current configuration,
/// including a plain file sitting where the directory should be. A missing
/// path is logged and reported as [`DeleteOutcome::Missing`].
pub fn remove_index_dir(dir: &Path) -> Result<DeleteOutcome, StoreError> {
    if !dir.exists() {
        tracing::warn!(path = %dir.display(), "vector index not found, nothing to delete");
        return Ok(DeleteOutcome::Missing);
    }

    if dir.is_dir() {
        std::fs::remove_dir_all(dir)?;
    } else {
        std::fs::remove_file(dir)?;
    }
    tracing::info!(path = %dir.display(), "deleted vector index");
    Ok(DeleteOutcome::Deleted)
}
