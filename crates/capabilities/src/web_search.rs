//! Capability: external web search (behind the approval gate).
//!
//! In production this would call a real search API (Brave, SerpAPI, Tavily).
//! This implementation returns deterministic mock results shaped like real
//! ones so the planner, approval flow, and tests exercise the full path.

use async_trait::async_trait;
use coachloop_core::capability::{Capability, CapabilityOutcome};
use coachloop_core::error::CapabilityError;

pub struct WebSearchCapability;

#[async_trait]
impl Capability for WebSearchCapability {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the public web for learning material on a topic. Requires user approval before running. Returns result titles, URLs, and snippets."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum results to return (optional, default 5)"
                }
            },
            "required": ["query"]
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "query": "string",
            "count": "integer",
            "results": "array of {title, url, snippet}"
        })
    }

    fn requires_approval(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutcome, CapabilityError> {
        let query = arguments["query"].as_str().unwrap_or_default();
        if query.trim().is_empty() {
            return Err(CapabilityError::InvalidInput {
                name: self.name().to_string(),
                reason: "'query' must be a non-empty string".into(),
            });
        }
        let max_results = arguments["max_results"].as_u64().unwrap_or(5) as usize;

        let slug = query
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        let candidates = [
            serde_json::json!({
                "title": format!("{query} — a practical introduction"),
                "url": format!("https://dev.example.org/articles/{slug}"),
                "snippet": format!("A hands-on walkthrough of {query} with worked examples and common pitfalls."),
            }),
            serde_json::json!({
                "title": format!("Understanding {query}"),
                "url": format!("https://learn.example.com/guides/{slug}"),
                "snippet": format!("This guide breaks {query} down into the core ideas you need before going deeper."),
            }),
            serde_json::json!({
                "title": format!("{query}: frequently asked questions"),
                "url": format!("https://forum.example.net/t/{slug}"),
                "snippet": format!("Community answers to the questions newcomers ask most about {query}."),
            }),
            serde_json::json!({
                "title": format!("Advanced notes on {query}"),
                "url": format!("https://blog.example.io/{slug}-deep-dive"),
                "snippet": format!("Where {query} gets subtle: edge cases, performance notes, and design tradeoffs."),
            }),
            serde_json::json!({
                "title": format!("{query} reference"),
                "url": format!("https://docs.example.org/reference/{slug}"),
                "snippet": format!("Reference documentation covering the full surface of {query}."),
            }),
        ];
        let results: Vec<_> = candidates.into_iter().take(max_results).collect();

        Ok(CapabilityOutcome::ok(serde_json::json!({
            "query": query,
            "count": results.len(),
            "results": results,
        })))
    }
}
