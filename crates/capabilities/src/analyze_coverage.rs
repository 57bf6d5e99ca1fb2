//! Capability: assess how well local content covers a topic.
//!
//! Runs a retrieval pass and reports what came back. When the result count
//! falls under the configured minimum, the outcome includes a research plan
//! proposing external searches, ready for the approval gate.

use async_trait::async_trait;
use coachloop_core::capability::{Capability, CapabilityOutcome};
use coachloop_core::error::CapabilityError;
use coachloop_core::session::{ProposedSearch, ResearchPlan};
use coachloop_rag::Retriever;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct AnalyzeCoverageCapability {
    retriever: Arc<Retriever>,
    min_db_results: usize,
}

impl AnalyzeCoverageCapability {
    pub fn new(retriever: Arc<Retriever>, min_db_results: usize) -> Self {
        Self {
            retriever,
            min_db_results,
        }
    }

    fn research_plan(query: &str, result_count: usize) -> ResearchPlan {
        ResearchPlan {
            goal: format!("Fill coverage gap for '{query}'"),
            searches: vec![
                ProposedSearch {
                    query: format!("{query} tutorial"),
                    rationale: format!(
                        "Only {result_count} indexed chunks match; an introductory source would anchor the digest"
                    ),
                },
                ProposedSearch {
                    query: format!("{query} best practices 2026"),
                    rationale: "Recent material keeps recommendations current".into(),
                },
            ],
        }
    }
}

#[async_trait]
impl Capability for AnalyzeCoverageCapability {
    fn name(&self) -> &str {
        "analyze_coverage"
    }

    fn description(&self) -> &str {
        "Check whether the learner's indexed content covers a topic well enough to digest. Reports result count and distinct sources; when coverage is thin, proposes web searches to fill the gap."
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
                    "description": "The topic or question to assess coverage for"
                }
            },
            "required": ["user_id", "query"]
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "result_count": "integer",
            "distinct_sources": "integer",
            "sources": "array of strings",
            "needs_web_search": "boolean",
            "research_plan": "present when needs_web_search; {goal, searches: [{query, rationale}]}"
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        let user_id = arguments["user_id"].as_str().unwrap_or_default();
        let query = arguments["query"].as_str().unwrap_or_default();

        let chunks = self
            .retriever
            .retrieve(query, user_id, None, None)
            .await
            .map_err(|e| CapabilityError::ExecutionFailed {
                name: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let sources: BTreeSet<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
        let needs_web_search = chunks.len() < self.min_db_results;

        let mut data = serde_json::json!({
            "result_count": chunks.len(),
            "distinct_sources": sources.len(),
            "sources": sources,
            "needs_web_search": needs_web_search,
        });
        if needs_web_search {
            let plan = Self::research_plan(query, chunks.len());
            data["research_plan"] =
                serde_json::to_value(&plan).map_err(|e| CapabilityError::ExecutionFailed {
                    name: self.name().to_string(),
                    reason: e.to_string(),
                })?;
        }

        Ok(CapabilityOutcome::ok(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubClient;
    use coachloop_config::RetrievalConfig;
    use coachloop_store::InMemoryStore;

    async fn store_with_chunks(n: usize) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for i in 0..n {
            store
                .add_chunk(
                    "u1",
                    &format!("Chunk {i} about traits."),
                    &format!("Source {i}"),
                    None,
                    None,
                    vec![1.0, 0.0, 0.0],
                )
                .await;
        }
        store
    }

    fn capability(store: Arc<InMemoryStore>, min_db_results: usize) -> AnalyzeCoverageCapability {
        let retriever = Retriever::new(
            Arc::new(StubClient::new("")),
            store,
            RetrievalConfig::default(),
        );
        AnalyzeCoverageCapability::new(Arc::new(retriever), min_db_results)
    }

    #[tokio::test]
    async fn good_coverage_needs_no_web_search() {
        let cap = capability(store_with_chunks(5).await, 3);
        let outcome = cap
            .execute(serde_json::json!({"user_id": "u1", "query": "traits"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data["result_count"], 5);
        assert_eq!(outcome.data["distinct_sources"], 5);
        assert_eq!(outcome.data["needs_web_search"], false);
        assert!(outcome.data.get("research_plan").is_none());
    }

    #[tokio::test]
    async fn thin_coverage_proposes_research_plan() {
        let cap = capability(store_with_chunks(1).await, 3);
        let outcome = cap
            .execute(serde_json::json!({"user_id": "u1", "query": "pinning"}))
            .await
            .unwrap();
        assert_eq!(outcome.data["needs_web_search"], true);
        let plan = &outcome.data["research_plan"];
        assert!(plan["goal"].as_str().unwrap().contains("pinning"));
        let searches = plan["searches"].as_array().unwrap();
        assert!(!searches.is_empty());
        assert!(searches[0]["rationale"].as_str().unwrap().len() > 10);
    }

    #[tokio::test]
    async fn empty_store_still_reports_coverage() {
        let cap = capability(Arc::new(InMemoryStore::new()), 3);
        let outcome = cap
            .execute(serde_json::json!({"user_id": "u1", "query": "pinning"}))
            .await
            .unwrap();
        assert_eq!(outcome.data["result_count"], 0);
        assert_eq!(outcome.data["needs_web_search"], true);
    }
}
