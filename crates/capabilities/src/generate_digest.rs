//! Capability: run the full digest pipeline for a learner.

use async_trait::async_trait;
use coachloop_core::capability::{Capability, CapabilityOutcome};
use coachloop_core::error::CapabilityError;
use coachloop_rag::{DigestGenerator, DigestRequest};
use std::sync::Arc;

pub struct GenerateDigestCapability {
    generator: Arc<DigestGenerator>,
}

impl GenerateDigestCapability {
    pub fn new(generator: Arc<DigestGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Capability for GenerateDigestCapability {
    fn name(&self) -> &str {
        "generate_digest"
    }

    fn description(&self) -> &str {
        "Generate today's personalized learning digest for a learner: retrieve relevant content, synthesize insights, and score their quality. Serves a cached digest when one is still fresh."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": {
                    "type": "string",
                    "description": "The learner identifier"
                },
                "force_refresh": {
                    "type": "boolean",
                    "description": "Regenerate even if a fresh cached digest exists (optional)"
                },
                "num_insights": {
                    "type": "integer",
                    "description": "How many insights to synthesize (optional)"
                },
                "query": {
                    "type": "string",
                    "description": "An explicit question to answer instead of the weekly digest query (optional)"
                }
            },
            "required": ["user_id"]
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "success": "boolean",
            "num_insights": "integer",
            "badge": "high | good | low",
            "quality": "object with faithfulness/context_precision/context_recall/average",
            "insights": "array of {title, explanation, takeaway, citations}",
            "date": "YYYY-MM-DD"
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        let user_id = arguments["user_id"].as_str().unwrap_or_default();

        let mut request = DigestRequest::for_user(user_id);
        request.force_refresh = arguments["force_refresh"].as_bool().unwrap_or(false);
        request.num_insights = arguments["num_insights"].as_u64().map(|n| n as usize);
        request.explicit_query = arguments["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .map(str::to_string);

        let digest = self.generator.generate(request).await.map_err(|e| {
            CapabilityError::ExecutionFailed {
                name: self.name().to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(CapabilityOutcome::ok(serde_json::json!({
            "success": digest.success,
            "num_insights": digest.num_insights(),
            "badge": digest.badge,
            "quality": digest.quality,
            "insights": digest.insights,
            "date": digest.digest_date.to_string(),
        })))
    }
}
