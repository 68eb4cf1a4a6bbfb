/*!
    Key-value persistence for the board. Values are JSON text stored
    under fixed keys in a single SQLite table.
!*/
use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("couldn't migrate database: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Opaque get/set storage the board writes through to.
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and runs migrations.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!().run(&pool).await?;
        tracing::debug!(path = %path.display(), "opened task database");
        Ok(SqliteStore { pool })
    }
}

impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let select_stmt = r#"
            select value from kv where key = $1
        "#;
        let row = sqlx::query(select_stmt)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let upsert_stmt = r#"
            insert into kv(key, value) values($1, $2)
            on conflict(key) do update set value = excluded.value
        "#;
        sqlx::query(upsert_stmt)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub use memory::MemoryStore;
