//! SQLite storage backend.
//!
//! A single database file holds four tables:
//! - `chunks` — indexed content with embedding BLOBs
//! - `sessions` — durable agent sessions (JSON payload)
//! - `digests` — (user_id, digest_date)-keyed digests, upserted in place
//! - `contexts` — learner context snapshots
//!
//! Similarity is computed in Rust over candidate rows; SQLite only scopes
//! and stores. Digest writes go through an explicit
//! `ON CONFLICT(user_id, digest_date) DO UPDATE` since blind inserts against
//! the composite unique key are a recurring failure mode.

use crate::vector::{blob_to_embedding, cosine_similarity, embedding_to_blob};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use coachloop_core::context::{ContextProvider, UserContext};
use coachloop_core::digest::{ChunkSearchBackend, Digest, DigestStore, RetrievedChunk};
use coachloop_core::error::StoreError;
use coachloop_core::session::{Session, SessionId, SessionStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// The production SQLite backend.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT UNIQUE NOT NULL,
                user_id      TEXT NOT NULL,
                text         TEXT NOT NULL,
                source       TEXT NOT NULL,
                url          TEXT,
                published_at TEXT,
                embedding    BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chunks table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_user ON chunks(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("chunks index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                status     TEXT NOT NULL,
                data       TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS digests (
                user_id      TEXT NOT NULL,
                digest_date  TEXT NOT NULL,
                data         TEXT NOT NULL,
                generated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, digest_date)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("digests table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contexts (
                user_id TEXT PRIMARY KEY,
                data    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("contexts table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Index a content chunk for a learner.
    pub async fn add_chunk(
        &self,
        user_id: &str,
        text: &str,
        source: &str,
        url: Option<&str>,
        published_at: Option<DateTime<Utc>>,
        embedding: &[f32],
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO chunks (id, user_id, text, source, url, published_at, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(text)
        .bind(source)
        .bind(url)
        .bind(published_at.map(|dt| dt.to_rfc3339()))
        .bind(embedding_to_blob(embedding))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert chunk: {e}")))?;
        Ok(id)
    }

    /// Store or replace a learner's context snapshot.
    pub async fn upsert_context(&self, context: &UserContext) -> Result<(), StoreError> {
        let data = serde_json::to_string(context)
            .map_err(|e| StoreError::Storage(format!("serialize context: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO contexts (user_id, data) VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET data = excluded.data
            "#,
        )
        .bind(&context.user_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("upsert context: {e}")))?;
        Ok(())
    }

    fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
        raw.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
    }
}

#[async_trait]
impl ChunkSearchBackend for SqliteStore {
    async fn search(
        &self,
        embedding: &[f32],
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, text, source, url, published_at, embedding FROM chunks WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("chunk search: {e}")))?;

        let mut scored: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.try_get("embedding").unwrap_or_default();
                let chunk_embedding = blob_to_embedding(&blob);
                RetrievedChunk {
                    id: row.try_get("id").unwrap_or_default(),
                    text: row.try_get("text").unwrap_or_default(),
                    source: row.try_get("source").unwrap_or_default(),
                    url: row.try_get("url").ok(),
                    published_at: Self::parse_timestamp(row.try_get("published_at").ok()),
                    similarity: cosine_similarity(&chunk_embedding, embedding),
                    final_score: 0.0,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let data = serde_json::to_string(session)
            .map_err(|e| StoreError::Storage(format!("serialize session: {e}")))?;
        let status = serde_json::to_string(&session.status)
            .map_err(|e| StoreError::Storage(format!("serialize status: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, status, data, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.user_id)
        .bind(status)
        .bind(data)
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("save session: {e}")))?;
        Ok(())
    }

    async fn load(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT data FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("load session: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let data: String = row
            .try_get("data")
            .map_err(|e| StoreError::QueryFailed(format!("data column: {e}")))?;
        let session: Session = serde_json::from_str(&data)
            .map_err(|e| StoreError::Storage(format!("deserialize session: {e}")))?;
        Ok(Some(session))
    }
}

#[async_trait]
impl DigestStore for SqliteStore {
    async fn upsert(&self, digest: &Digest) -> Result<(), StoreError> {
        let data = serde_json::to_string(digest)
            .map_err(|e| StoreError::Storage(format!("serialize digest: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO digests (user_id, digest_date, data, generated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, digest_date) DO UPDATE SET
                data = excluded.data,
                generated_at = excluded.generated_at
            "#,
        )
        .bind(&digest.user_id)
        .bind(digest.digest_date.to_string())
        .bind(data)
        .bind(digest.generated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("upsert digest: {e}")))?;
        Ok(())
    }

    async fn find(&self, user_id: &str, date: NaiveDate) -> Result<Option<Digest>, StoreError> {
        let row = sqlx::query("SELECT data FROM digests WHERE user_id = ? AND digest_date = ?")
            .bind(user_id)
            .bind(date.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("find digest: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let data: String = row
            .try_get("data")
            .map_err(|e| StoreError::QueryFailed(format!("data column: {e}")))?;
        let digest: Digest = serde_json::from_str(&data)
            .map_err(|e| StoreError::Storage(format!("deserialize digest: {e}")))?;
        Ok(Some(digest))
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<Digest>, StoreError> {
        let rows = sqlx::query(
            "SELECT data FROM digests WHERE user_id = ? ORDER BY digest_date DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("recent digests: {e}")))?;

        rows.iter()
            .map(|row| {
                let data: String = row
                    .try_get("data")
                    .map_err(|e| StoreError::QueryFailed(format!("data column: {e}")))?;
                serde_json::from_str(&data)
                    .map_err(|e| StoreError::Storage(format!("deserialize digest: {e}")))
            })
            .collect()
    }
}

#[async_trait]
impl ContextProvider for SqliteStore {
    async fn user_context(&self, user_id: &str) -> Result<Option<UserContext>, StoreError> {
        let row = sqlx::query("SELECT data FROM contexts WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("load context: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let data: String = row
            .try_get("data")
            .map_err(|e| StoreError::QueryFailed(format!("data column: {e}")))?;
        let context: UserContext = serde_json::from_str(&data)
            .map_err(|e| StoreError::Storage(format!("deserialize context: {e}")))?;
        Ok(Some(context))
    }
}
