//! `SQLite` store
//!
//! Durable on-device storage, one `kv` table

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqliteJournalMode;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::Result;

use super::LocalStore;

/// Migrator to run migrations on open
static MIGRATOR: Migrator = sqlx::migrate!();

/// `SQLite` local store
#[derive(Clone, Debug)]
pub struct Sqlite {
    /// Pool of connections
    connection_pool: SqlitePool,
}

impl Sqlite {
    /// Open (or create) the database at a path
    ///
    /// Migrations will be run
    ///
    /// # Errors
    ///
    /// Will return `Err` when the file can not be opened or migrated
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let connection_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await?;

        MIGRATOR.run(&connection_pool).await?;

        Ok(Self { connection_pool })
    }
}

#[async_trait]
impl LocalStore for Sqlite {
    async fn get(&self, key: &str) -> Option<String> {
        let value = sqlx::query_scalar::<_, String>(
            r"
            SELECT value
            FROM kv
            WHERE key = ?1
            ",
        )
        .bind(key)
        .fetch_optional(&self.connection_pool)
        .await;

        match value {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Could not read `{key}` from the local store: {err}");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO kv (key, value)
            VALUES (?1, ?2)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            ",
        )
        .bind(key)
        .bind(value)
        .execute(&self.connection_pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query(
            r"
            DELETE FROM kv
            WHERE key = ?1
            ",
        )
        .bind(key)
        .execute(&self.connection_pool)
        .await?;

        Ok(())
    }
}
