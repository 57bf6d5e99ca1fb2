//! Built-in capabilities for the coachloop agent.
//!
//! Capabilities give the planner things to do: fetch learner context, run
//! vector search, generate the daily digest, look up past insights, assess
//! local coverage, and (behind the approval gate) search the web.

pub mod analyze_coverage;
pub mod generate_digest;
pub mod get_user_context;
pub mod search_content;
pub mod search_past_insights;
pub mod web_search;

pub use analyze_coverage::AnalyzeCoverageCapability;
pub use generate_digest::GenerateDigestCapability;
pub use get_user_context::GetUserContextCapability;
pub use search_content::SearchContentCapability;
pub use search_past_insights::SearchPastInsightsCapability;
pub use web_search::WebSearchCapability;

use coachloop_core::capability::CapabilityRegistry;
use coachloop_core::context::ContextProvider;
use coachloop_core::digest::DigestStore;
use coachloop_rag::{DigestGenerator, Retriever};
use std::sync::Arc;

/// Build the default registry with every built-in capability.
pub fn default_registry(
    context_provider: Arc<dyn ContextProvider>,
    retriever: Arc<Retriever>,
    digest_generator: Arc<DigestGenerator>,
    digest_store: Arc<dyn DigestStore>,
    min_db_results: usize,
) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(Box::new(GetUserContextCapability::new(context_provider)));
    registry.register(Box::new(SearchContentCapability::new(retriever.clone())));
    registry.register(Box::new(GenerateDigestCapability::new(digest_generator)));
    registry.register(Box::new(SearchPastInsightsCapability::new(digest_store)));
    registry.register(Box::new(AnalyzeCoverageCapability::new(
        retriever,
        min_db_results,
    )));
    registry.register(Box::new(WebSearchCapability));
    registry
}

#[cfg(test)]
pub(crate) mod testing;
