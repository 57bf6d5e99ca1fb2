//! Capability: vector search over the learner's indexed content.

use async_trait::async_trait;
use coachloop_core::capability::{Capability, CapabilityOutcome};
use coachloop_core::error::CapabilityError;
use coachloop_rag::Retriever;
use std::sync::Arc;

pub struct SearchContentCapability {
    retriever: Arc<Retriever>,
}

impl SearchContentCapability {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Capability for SearchContentCapability {
    fn name(&self) -> &str {
        "search_content"
    }

    fn description(&self) -> &str {
        "Semantic search over the learner's indexed course material and saved articles. Returns ranked excerpts with sources."
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
                    "description": "Natural-language search query (keep it short and focused)"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum chunks to return (optional)"
                }
            },
            "required": ["user_id", "query"]
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "count": "integer",
            "chunks": "array of {text, source, url, similarity, final_score}"
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        let user_id = arguments["user_id"].as_str().unwrap_or_default();
        let query = arguments["query"].as_str().unwrap_or_default();
        let top_k = arguments["top_k"].as_u64().map(|k| k as usize);

        let chunks = self
            .retriever
            .retrieve(query, user_id, top_k, None)
            .await
            .map_err(|e| CapabilityError::ExecutionFailed {
                name: self.name().to_string(),
                reason: e.to_string(),
            })?;

        // Empty is a successful search with no matches, not a failure
        Ok(CapabilityOutcome::ok(serde_json::json!({
            "count": chunks.len(),
            "chunks": chunks,
        })))
    }
}
