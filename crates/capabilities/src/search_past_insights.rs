//! Capability: keyword search over previously generated digest insights.

use async_trait::async_trait;
use coachloop_core::capability::{Capability, CapabilityOutcome};
use coachloop_core::digest::DigestStore;
use coachloop_core::error::CapabilityError;
use std::sync::Arc;

const DEFAULT_DIGEST_LOOKBACK: usize = 30;

pub struct SearchPastInsightsCapability {
    store: Arc<dyn DigestStore>,
}

impl SearchPastInsightsCapability {
    pub fn new(store: Arc<dyn DigestStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Capability for SearchPastInsightsCapability {
    fn name(&self) -> &str {
        "search_past_insights"
    }

    fn description(&self) -> &str {
        "Keyword search over insights from the learner's past digests. Useful for spotting topics already covered or refreshing something explained before."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": {
                    "type": "string",
                    "description": "The learner identifier"
                },
                "query": {
                    "type": "string",
                    "description": "Keywords to match against insight titles and explanations"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum matches to return (optional, default 10)"
                }
            },
            "required": ["user_id", "query"]
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "count": "integer",
            "matches": "array of {date, title, explanation, takeaway, citations}"
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        let user_id = arguments["user_id"].as_str().unwrap_or_default();
        let query = arguments["query"].as_str().unwrap_or_default();
        let limit = arguments["limit"].as_u64().unwrap_or(10) as usize;

        let digests = self
            .store
            .recent(user_id, DEFAULT_DIGEST_LOOKBACK)
            .await
            .map_err(|e| CapabilityError::ExecutionFailed {
                name: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let needles: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let mut matches = Vec::new();
        'outer: for digest in &digests {
            for insight in &digest.insights {
                let haystack = format!(
                    "{} {}",
                    insight.title.to_lowercase(),
                    insight.explanation.to_lowercase()
                );
                if needles.iter().any(|n| haystack.contains(n)) {
                    matches.push(serde_json::json!({
                        "date": digest.digest_date.to_string(),
                        "title": insight.title,
                        "explanation": insight.explanation,
                        "takeaway": insight.takeaway,
                        "citations": insight.citations,
                    }));
                    if matches.len() >= limit {
                        break 'outer;
                    }
                }
            }
        }

        Ok(CapabilityOutcome::ok(serde_json::json!({
            "count": matches.len(),
            "matches": matches,
        })))
    }
}
