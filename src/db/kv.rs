use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::Mutex;

use crate::error::PersistError;

/// Durable string-keyed storage. `set` replaces the whole value for a key.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), PersistError>;

    async fn health_check(&self) -> Result<(), PersistError> {
        Ok(())
    }
}

pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    /// Opens (creating if missing) the database at `database_url` and runs migrations.
    pub async fn connect(database_url: &str) -> Result<Self, PersistError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// A private in-memory database. One connection, kept alive for the pool's lifetime,
    /// since every new sqlite memory connection starts out empty.
    pub async fn in_memory() -> Result<Self, PersistError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, PersistError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), PersistError> {
        sqlx::query("select 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
