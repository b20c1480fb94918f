//! Key-value persistence layer.
//!
//! The registry and history store persist whole collections through the
//! [`KeyValueStore`] trait. The production implementation is a local SQLite
//! database; in-memory and failing variants back the test suites.

mod memory;
mod migrations;

pub use memory::{FailingStore, MemoryStore};

use crate::error::{ConduitError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 100;

/// Trait defining the key-value persistence interface.
///
/// Values are JSON documents; callers serialize whole collections and write
/// them back in one save so the store never holds a partial state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Saves a value under the given key, replacing any existing value.
    async fn save(&self, key: &str, value: &serde_json::Value) -> Result<()>;

    /// Loads the value for a key, or `None` if absent.
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Removes a key, returning whether a value was removed.
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Removes all keys.
    async fn clear(&self) -> Result<bool>;
}

/// SQLite-backed state store.
pub struct StateStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl StateStore {
    /// Opens or creates the state store at the default platform path.
    ///
    /// - Linux/macOS: `~/.config/db-conduit/state.db`
    /// - Windows: `%APPDATA%\db-conduit\state.db`
    pub async fn open_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open(&path).await
    }

    /// Opens or creates the state store at the specified path.
    pub async fn open(path: &PathBuf) -> Result<Self> {
        Self::ensure_parent_dirs(path)?;

        match Self::try_open(path).await {
            Ok(store) => Ok(store),
            Err(e) => {
                warn!("Failed to open state store: {e}. Attempting recovery...");
                Self::attempt_recovery(path).await
            }
        }
    }

    /// Returns the default state store path for the current platform.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConduitError::storage("Could not determine config directory"))?;
        Ok(config_dir.join("db-conduit").join("state.db"))
    }

    /// Attempts to open the database with retries for lock contention.
    async fn try_open(path: &PathBuf) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * 2u64.pow(attempt)))
                    .await;
            }

            match Self::connect(path).await {
                Ok(pool) => {
                    migrations::run_migrations(&pool).await?;
                    info!("State store opened at {}", path.display());
                    return Ok(Self {
                        pool,
                        db_path: path.clone(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ConduitError::storage("Failed to open state store after retries")))
    }

    /// Creates a connection pool to the SQLite database.
    async fn connect(path: &PathBuf) -> Result<SqlitePool> {
        let conn_str = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&conn_str)
            .map_err(|e| ConduitError::storage(format!("Invalid database path: {e}")))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| ConduitError::storage(format!("Failed to connect to state store: {e}")))
    }

    /// Ensures parent directories exist for the database path.
    fn ensure_parent_dirs(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConduitError::storage(format!(
                    "Failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        Ok(())
    }

    /// Attempts to recover from a corrupted database by backing up and recreating.
    async fn attempt_recovery(path: &PathBuf) -> Result<Self> {
        let backup_path = path.with_extension("db.bak");

        if path.exists() {
            std::fs::rename(path, &backup_path).map_err(|e| {
                ConduitError::storage(format!(
                    "Failed to backup corrupted database to {}: {e}",
                    backup_path.display()
                ))
            })?;
            warn!("Backed up corrupted database to {}", backup_path.display());
        }

        Self::try_open(path).await.map_err(|e| {
            ConduitError::storage(format!("Failed to recreate database after backup: {e}"))
        })
    }

    /// Returns the path to the state store.
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for StateStore {
    async fn save(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let encoded = serde_json::to_string(value)
            .map_err(|e| ConduitError::internal(format!("Failed to encode value: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            "#,
        )
        .bind(key)
        .bind(&encoded)
        .execute(&self.pool)
        .await
        .map_err(|e| ConduitError::storage(format!("Failed to save '{key}': {e}")))?;

        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ConduitError::storage(format!("Failed to load '{key}': {e}")))?;

        match row {
            Some((encoded,)) => {
                let value = serde_json::from_str(&encoded).map_err(|e| {
                    ConduitError::storage(format!("Corrupt value for '{key}': {e}"))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| ConduitError::storage(format!("Failed to remove '{key}': {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<bool> {
        sqlx::query("DELETE FROM kv_entries")
            .execute(&self.pool)
            .await
            .map_err(|e| ConduitError::storage(format!("Failed to clear store: {e}")))?;

        Ok(true)
    }
}
