use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Open a pool on the SQLite file at `db_path`.
///
/// With `create = false` a missing file is an error rather than a new empty
/// database.
pub async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal);

    // Single writer per index; a small pool is plenty.
    SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
}
