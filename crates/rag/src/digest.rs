//! The digest pipeline: query → retrieve → synthesize → evaluate → cache.
//!
//! `DigestGenerator` sequences the stateless pipeline services and owns the
//! policies around them: the (user, date) cache with expiry, the
//! quality-gate retry in stricter synthesis mode, and the upsert into the
//! digest store.

use crate::evaluator::Evaluator;
use crate::query::QueryBuilder;
use crate::retriever::Retriever;
use crate::synthesizer::Synthesizer;
use chrono::{Duration, NaiveDate, Utc};
use coachloop_config::DigestConfig;
use coachloop_core::context::ContextProvider;
use coachloop_core::digest::{Digest, DigestStore};
use coachloop_core::error::{Error, Result};
use coachloop_core::event::{DomainEvent, EventBus};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// One digest generation request.
#[derive(Debug, Clone, Default)]
pub struct DigestRequest {
    pub user_id: String,
    /// Defaults to today (UTC)
    pub date: Option<NaiveDate>,
    /// Defaults to the configured insight count
    pub num_insights: Option<usize>,
    /// Skip the cache and regenerate
    pub force_refresh: bool,
    /// Q&A mode: use this question instead of the digest-mode query
    pub explicit_query: Option<String>,
}

impl DigestRequest {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}

/// Sequences the digest pipeline and owns cache + quality-gate policy.
pub struct DigestGenerator {
    query_builder: QueryBuilder,
    retriever: Retriever,
    synthesizer: Synthesizer,
    evaluator: Evaluator,
    digest_store: Arc<dyn DigestStore>,
    context_provider: Arc<dyn ContextProvider>,
    config: DigestConfig,
    events: Arc<EventBus>,
}

impl DigestGenerator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        query_builder: QueryBuilder,
        retriever: Retriever,
        synthesizer: Synthesizer,
        evaluator: Evaluator,
        digest_store: Arc<dyn DigestStore>,
        context_provider: Arc<dyn ContextProvider>,
        config: DigestConfig,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            query_builder,
            retriever,
            synthesizer,
            evaluator,
            digest_store,
            context_provider,
            config,
            events,
        }
    }

    /// Generate (or serve from cache) the digest for a learner and date.
    ///
    /// Zero retrieved chunks is not a failure: the returned digest carries
    /// `success = false`, empty insights, and explanatory metadata, and is
    /// still upserted so repeated calls stay cheap until content arrives.
    pub async fn generate(&self, request: DigestRequest) -> Result<Digest> {
        let now = Utc::now();
        let date = request.date.unwrap_or_else(|| now.date_naive());

        if !request.force_refresh {
            if let Some(cached) = self.digest_store.find(&request.user_id, date).await? {
                if cached.is_fresh(now) {
                    info!(user_id = %request.user_id, %date, "Serving cached digest");
                    self.events.publish(DomainEvent::DigestGenerated {
                        user_id: request.user_id.clone(),
                        num_insights: cached.num_insights(),
                        quality_average: cached.quality.average,
                        cached: true,
                        timestamp: now,
                    });
                    return Ok(cached);
                }
            }
        }

        let context = self
            .context_provider
            .user_context(&request.user_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!("no learner context for '{}'", request.user_id))
            })?;

        let query = self
            .query_builder
            .build(&context, request.explicit_query.as_deref());

        let chunks = self
            .retriever
            .retrieve(&query, &request.user_id, None, None)
            .await?;

        let mut output = self
            .synthesizer
            .synthesize(&chunks, &context, &query, request.num_insights, false)
            .await?;
        let mut score = self.evaluator.evaluate(&query, &output.insights, &chunks).await;
        let mut retried = false;

        // One stricter-mode retry when the gate fails on non-empty output.
        if self.config.quality_gate_retry
            && !score.quality_gate_passed
            && !output.insights.is_empty()
        {
            warn!(
                average = score.average,
                "Quality gate failed, retrying synthesis in strict mode"
            );
            retried = true;
            let retry_output = self
                .synthesizer
                .synthesize(&chunks, &context, &query, request.num_insights, true)
                .await?;
            let retry_score = self
                .evaluator
                .evaluate(&query, &retry_output.insights, &chunks)
                .await;
            if retry_score.average > score.average {
                output = retry_output;
                score = retry_score;
            }
        }

        let badge = self.evaluator.badge(&score);
        let success = !output.insights.is_empty();

        let mut metadata = output.metadata;
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("query".into(), json!(query));
            obj.insert("retrieved_chunks".into(), json!(chunks.len()));
            obj.insert("quality_gate_retried".into(), json!(retried));
        }

        let digest = Digest {
            user_id: request.user_id.clone(),
            digest_date: date,
            context: serde_json::to_value(&context)?,
            insights: output.insights,
            quality: score,
            badge,
            success,
            metadata,
            generated_at: now,
            cache_expires_at: now + Duration::hours(self.config.cache_ttl_hours),
        };

        self.digest_store.upsert(&digest).await?;
        info!(
            user_id = %request.user_id,
            %date,
            num_insights = digest.num_insights(),
            badge = %digest.badge,
            success,
            "Digest generated"
        );
        self.events.publish(DomainEvent::DigestGenerated {
            user_id: request.user_id,
            num_insights: digest.num_insights(),
            quality_average: digest.quality.average,
            cached: false,
            timestamp: now,
        });

        Ok(digest)
    }
}
