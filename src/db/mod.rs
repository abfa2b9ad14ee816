use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};

use crate::core::errors::{AppError, AppResult};

pub mod repositories;

pub const DB_FILE_NAME: &str = "docsign.sqlite";
const DATA_DIR_NAME: &str = ".docsign";

/// The document record is one row, so a handful of connections is plenty.
const MAX_CONNECTIONS: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool over the sqlite file holding the active document record.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (or creates) `docsign.sqlite` under `data_dir` and applies pending migrations.
    pub async fn new(data_dir: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|err| AppError::StorageWrite(format!("cannot create {}: {err}", data_dir.display())))?;
        let db_path = data_dir.join(DB_FILE_NAME);
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|err| AppError::StorageWrite(format!("cannot open {}: {err}", db_path.display())))?;
        let db = Self::migrated(pool).await?;
        tracing::info!(path = %db_path.display(), "document database ready");
        Ok(db)
    }

    /// A private in-memory database; one connection so every query sees the same data.
    pub async fn in_memory() -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await?;
        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> AppResult<Self> {
        sqlx::migrate!("./src/db/migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// `base` when given, otherwise `.docsign` under the working directory.
pub fn default_data_dir(base: Option<PathBuf>) -> AppResult<PathBuf> {
    match base {
        Some(path) => Ok(path),
        None => std::env::current_dir()
            .map(|cwd| cwd.join(DATA_DIR_NAME))
            .map_err(|err| AppError::Internal(format!("cannot resolve working directory: {err}"))),
    }
}
