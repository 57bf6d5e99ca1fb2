//! Digest domain types — retrieved chunks, insights, quality scores, and the
//! stored digest itself.
//!
//! A digest is the end product of the RAG pipeline: a dated, per-learner
//! bundle of synthesized insights with a quality score attached. Digests are
//! unique per (user, date); regenerating for the same key overwrites.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A chunk of indexed content returned by vector search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk identifier in the backing store
    pub id: String,

    /// The chunk text
    pub text: String,

    /// Human-readable source name (article title, course page, ...)
    pub source: String,

    /// Source URL when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// When the source content was published. Always UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    /// Raw cosine similarity against the query embedding
    pub similarity: f32,

    /// Hybrid score after recency re-ranking (similarity + recency decay)
    #[serde(default)]
    pub final_score: f32,
}

/// One synthesized insight, grounded in retrieved chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    /// Short headline
    pub title: String,

    /// The explanation of the concept or finding
    pub explanation: String,

    /// A concrete, actionable takeaway for the learner
    pub takeaway: String,

    /// Sources this insight cites. Each must match a retrieved chunk's
    /// `source`; insights that cite nothing retrieved are dropped upstream.
    pub citations: Vec<String>,
}

/// Quality scores from LLM-judge evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityScore {
    /// Are insight claims entailed by the cited chunks? (0.0 to 1.0)
    pub faithfulness: f64,

    /// Fraction of retrieved chunks relevant to the query
    pub context_precision: f64,

    /// Fraction of reference content the chunks cover
    pub context_recall: f64,

    /// Mean of the three metrics
    pub average: f64,

    /// Whether the score clears the configured quality gate
    pub quality_gate_passed: bool,

    /// Set when scoring was short-circuited (e.g., nothing to evaluate)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QualityScore {
    pub fn new(
        faithfulness: f64,
        context_precision: f64,
        context_recall: f64,
        gate_minimum: f64,
    ) -> Self {
        let average = (faithfulness + context_precision + context_recall) / 3.0;
        Self {
            faithfulness,
            context_precision,
            context_recall,
            average,
            quality_gate_passed: average >= gate_minimum,
            error: None,
        }
    }

    /// All-zero score for the empty-input short circuit.
    pub fn zero(reason: impl Into<String>) -> Self {
        Self {
            faithfulness: 0.0,
            context_precision: 0.0,
            context_recall: 0.0,
            average: 0.0,
            quality_gate_passed: false,
            error: Some(reason.into()),
        }
    }

    /// Three-tier badge derived from the average.
    pub fn badge(&self, gate_minimum: f64) -> &'static str {
        if self.average >= 0.85 {
            "high"
        } else if self.average >= gate_minimum {
            "good"
        } else {
            "low"
        }
    }
}

/// A dated, per-learner digest — the stored end product of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    /// Which learner this digest is for
    pub user_id: String,

    /// The date this digest covers. One digest per (user, date).
    pub digest_date: NaiveDate,

    /// The learner context snapshot at generation time
    pub context: serde_json::Value,

    /// Synthesized insights
    pub insights: Vec<Insight>,

    pub quality: QualityScore,

    /// Badge string ("high" / "good" / "low")
    pub badge: String,

    /// Whether generation produced a usable digest
    pub success: bool,

    /// Generation metadata (model id, chunk count, query, error notes)
    #[serde(default)]
    pub metadata: serde_json::Value,

    pub generated_at: DateTime<Utc>,

    /// After this instant, cached copies are considered stale
    pub cache_expires_at: DateTime<Utc>,
}

impl Digest {
    pub fn num_insights(&self) -> usize {
        self.insights.len()
    }

    /// A cached digest is servable only while fresh and non-empty.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        !self.insights.is_empty() && now < self.cache_expires_at
    }
}

/// Persistence for digests.
#[async_trait]
pub trait DigestStore: Send + Sync {
    /// Insert or overwrite the digest for its (user, date) key.
    async fn upsert(&self, digest: &Digest) -> std::result::Result<(), StoreError>;

    /// Fetch the digest for a (user, date) key, if any.
    async fn find(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> std::result::Result<Option<Digest>, StoreError>;

    /// Most recent digests for a user, newest first.
    async fn recent(
        &self,
        user_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Digest>, StoreError>;
}

/// Vector search over indexed content chunks.
///
/// Implementations run similarity search scoped to a learner's active
/// sources and return candidates with raw similarity; re-ranking is the
/// retriever's job, not the backend's.
#[async_trait]
pub trait ChunkSearchBackend: Send + Sync {
    async fn search(
        &self,
        embedding: &[f32],
        user_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<RetrievedChunk>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_score_averages_and_gates() {
        let score = QualityScore::new(0.9, 0.8, 0.7, 0.7);
        assert!((score.average - 0.8).abs() < 1e-9);
        assert!(score.quality_gate_passed);

        let failing = QualityScore::new(0.5, 0.5, 0.5, 0.7);
        assert!(!failing.quality_gate_passed);
    }

    #[test]
    fn badge_tiers() {
        assert_eq!(QualityScore::new(0.9, 0.9, 0.9, 0.7).badge(0.7), "high");
        assert_eq!(QualityScore::new(0.75, 0.75, 0.75, 0.7).badge(0.7), "good");
        assert_eq!(QualityScore::new(0.4, 0.4, 0.4, 0.7).badge(0.7), "low");
    }

    #[test]
    fn zero_score_carries_reason() {
        let score = QualityScore::zero("no insights to evaluate");
        assert_eq!(score.average, 0.0);
        assert!(!score.quality_gate_passed);
        assert!(score.error.unwrap().contains("no insights"));
    }

    #[test]
    fn digest_freshness() {
        let now = Utc::now();
        let digest = Digest {
            user_id: "u1".into(),
            digest_date: now.date_naive(),
            context: serde_json::Value::Null,
            insights: vec![Insight {
                title: "Ownership".into(),
                explanation: "Every value has a single owner.".into(),
                takeaway: "Prefer borrowing over cloning.".into(),
                citations: vec!["The Book".into()],
            }],
            quality: QualityScore::new(0.8, 0.8, 0.8, 0.7),
            badge: "good".into(),
            success: true,
            metadata: serde_json::Value::Null,
            generated_at: now,
            cache_expires_at: now + chrono::Duration::hours(6),
        };
        assert!(digest.is_fresh(now));
        assert!(!digest.is_fresh(now + chrono::Duration::hours(7)));
    }

    #[test]
    fn empty_digest_is_never_fresh() {
        let now = Utc::now();
        let digest = Digest {
            user_id: "u1".into(),
            digest_date: now.date_naive(),
            context: serde_json::Value::Null,
            insights: vec![],
            quality: QualityScore::zero("no chunks"),
            badge: "low".into(),
            success: false,
            metadata: serde_json::Value::Null,
            generated_at: now,
            cache_expires_at: now + chrono::Duration::hours(6),
        };
        assert!(!digest.is_fresh(now));
    }
}
