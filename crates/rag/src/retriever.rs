//! Hybrid retrieval: vector similarity blended with recency and source
//! diversity.
//!
//! The retriever embeds the query, pulls candidates from the search
//! backend, drops anything under the similarity floor, re-ranks with a
//! recency-aware hybrid score, and enforces a soft per-source cap before
//! truncating to `k`. An empty result is a normal outcome, never an error.

use chrono::{DateTime, Utc};
use coachloop_config::RetrievalConfig;
use coachloop_core::digest::{ChunkSearchBackend, RetrievedChunk};
use coachloop_core::error::RetrievalError;
use coachloop_core::llm::CompletionClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Stateless retrieval service, shared across sessions.
#[derive(Clone)]
pub struct Retriever {
    client: Arc<dyn CompletionClient>,
    backend: Arc<dyn ChunkSearchBackend>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        backend: Arc<dyn ChunkSearchBackend>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            client,
            backend,
            config,
        }
    }

    /// Retrieve the top chunks for a query, scoped to one learner.
    ///
    /// `k` and `min_similarity` default to the configured values when `None`.
    /// Returns `Ok(vec![])` when nothing clears the threshold; callers must
    /// treat that distinctly from `Err`.
    pub async fn retrieve(
        &self,
        query: &str,
        user_id: &str,
        k: Option<usize>,
        min_similarity: Option<f32>,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let k = k.unwrap_or(self.config.top_k);
        let min_similarity = min_similarity.unwrap_or(self.config.min_similarity);

        let embeddings = self
            .client
            .embed(&[query.to_string()])
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;
        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("no embedding returned".into()))?;

        let candidates = self
            .backend
            .search(&embedding, user_id, self.config.candidate_limit)
            .await
            .map_err(|e| RetrievalError::SearchFailed(e.to_string()))?;

        let now = Utc::now();
        let mut scored: Vec<RetrievedChunk> = candidates
            .into_iter()
            .filter(|c| c.similarity >= min_similarity)
            .map(|mut c| {
                c.final_score = self.config.similarity_weight * c.similarity
                    + self.config.recency_weight * self.recency_decay(c.published_at, now);
                c
            })
            .collect();

        scored.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let results = self.diversify(scored, k);
        debug!(
            query_words = query.split_whitespace().count(),
            user_id,
            returned = results.len(),
            "Retrieval complete"
        );
        Ok(results)
    }

    /// Exponential recency decay with a configurable half-life.
    ///
    /// Both sides of the subtraction are UTC; undated content earns no
    /// recency boost.
    fn recency_decay(&self, published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
        let Some(published) = published_at else {
            return 0.0;
        };
        let age_days = (now - published).num_seconds() as f64 / 86_400.0;
        if age_days <= 0.0 {
            return 1.0;
        }
        0.5f64.powf(age_days / self.config.recency_half_life_days) as f32
    }

    /// Soft per-source cap: take chunks in score order, deferring any that
    /// would push a source over `max_per_source`; refill from the deferred
    /// list only if the cap leaves slots unused.
    fn diversify(&self, ranked: Vec<RetrievedChunk>, k: usize) -> Vec<RetrievedChunk> {
        let mut kept = Vec::with_capacity(k);
        let mut deferred = Vec::new();
        let mut per_source: HashMap<String, usize> = HashMap::new();

        for chunk in ranked {
            if kept.len() == k {
                break;
            }
            let count = per_source.entry(chunk.source.clone()).or_insert(0);
            if *count < self.config.max_per_source {
                *count += 1;
                kept.push(chunk);
            } else {
                deferred.push(chunk);
            }
        }

        for chunk in deferred {
            if kept.len() == k {
                break;
            }
            kept.push(chunk);
        }

        kept
    }
}
