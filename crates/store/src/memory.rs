//! In-memory storage — for tests, demos, and ephemeral runs.
//!
//! A single `InMemoryStore` implements all three storage traits behind
//! `RwLock`s. Nothing survives process exit.

use crate::vector::cosine_similarity;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use coachloop_core::context::{ContextProvider, UserContext};
use coachloop_core::digest::{ChunkSearchBackend, Digest, DigestStore, RetrievedChunk};
use coachloop_core::error::StoreError;
use coachloop_core::session::{Session, SessionId, SessionStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One indexed content chunk with its embedding.
#[derive(Debug, Clone)]
struct ChunkRecord {
    id: String,
    user_id: String,
    text: String,
    source: String,
    url: Option<String>,
    published_at: Option<DateTime<Utc>>,
    embedding: Vec<f32>,
}

/// In-memory implementation of all storage traits.
#[derive(Default)]
pub struct InMemoryStore {
    chunks: RwLock<Vec<ChunkRecord>>,
    sessions: RwLock<HashMap<SessionId, Session>>,
    digests: RwLock<HashMap<(String, NaiveDate), Digest>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a content chunk for a learner.
    pub async fn add_chunk(
        &self,
        user_id: impl Into<String>,
        text: impl Into<String>,
        source: impl Into<String>,
        url: Option<String>,
        published_at: Option<DateTime<Utc>>,
        embedding: Vec<f32>,
    ) {
        let mut chunks = self.chunks.write().await;
        let id = format!("chunk-{}", chunks.len() + 1);
        chunks.push(ChunkRecord {
            id,
            user_id: user_id.into(),
            text: text.into(),
            source: source.into(),
            url,
            published_at,
            embedding,
        });
    }

    pub async fn chunk_count(&self) -> usize {
        self.chunks.read().await.len()
    }
}

#[async_trait]
impl ChunkSearchBackend for InMemoryStore {
    async fn search(
        &self,
        embedding: &[f32],
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let chunks = self.chunks.read().await;
        let mut scored: Vec<RetrievedChunk> = chunks
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| RetrievedChunk {
                id: c.id.clone(),
                text: c.text.clone(),
                source: c.source.clone(),
                url: c.url.clone(),
                published_at: c.published_at,
                similarity: cosine_similarity(&c.embedding, embedding),
                final_score: 0.0,
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
impl SessionStore for InMemoryStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn load(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl DigestStore for InMemoryStore {
    async fn upsert(&self, digest: &Digest) -> Result<(), StoreError> {
        self.digests.write().await.insert(
            (digest.user_id.clone(), digest.digest_date),
            digest.clone(),
        );
        Ok(())
    }

    async fn find(&self, user_id: &str, date: NaiveDate) -> Result<Option<Digest>, StoreError> {
        Ok(self
            .digests
            .read()
            .await
            .get(&(user_id.to_string(), date))
            .cloned())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<Digest>, StoreError> {
        let digests = self.digests.read().await;
        let mut found: Vec<Digest> = digests
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.digest_date.cmp(&a.digest_date));
        found.truncate(limit);
        Ok(found)
    }
}

/// A fixed-context provider for tests and single-user setups.
pub struct StaticContextProvider {
    contexts: HashMap<String, UserContext>,
}

impl StaticContextProvider {
    pub fn new(contexts: Vec<UserContext>) -> Self {
        Self {
            contexts: contexts
                .into_iter()
                .map(|c| (c.user_id.clone(), c))
                .collect(),
        }
    }

    pub fn single(context: UserContext) -> Self {
        Self::new(vec![context])
    }
}

#[async_trait]
impl ContextProvider for StaticContextProvider {
    async fn user_context(&self, user_id: &str) -> Result<Option<UserContext>, StoreError> {
        Ok(self.contexts.get(user_id).cloned())
    }
}
