//! Insight synthesis: one completion call over retrieved chunks, parsed
//! through the tolerant extraction chain.

use crate::parser::parse_insights;
use crate::prompt;
use coachloop_config::SynthesisConfig;
use coachloop_core::context::UserContext;
use coachloop_core::digest::{Insight, RetrievedChunk};
use coachloop_core::error::SynthesisError;
use coachloop_core::json::{extract_json, reply_preview};
use coachloop_core::llm::{CompletionClient, CompletionOptions};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// The surviving insights plus generation metadata.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub insights: Vec<Insight>,
    pub metadata: serde_json::Value,
}

/// Stateless synthesis service, shared across sessions.
pub struct Synthesizer {
    client: Arc<dyn CompletionClient>,
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(client: Arc<dyn CompletionClient>, config: SynthesisConfig) -> Self {
        Self { client, config }
    }

    /// Synthesize insights from retrieved chunks.
    ///
    /// With empty `chunks` this returns an empty insight list and an
    /// explanatory metadata entry without calling the completion service.
    /// Completion failures surface as typed errors, never as silently
    /// empty output.
    pub async fn synthesize(
        &self,
        chunks: &[RetrievedChunk],
        context: &UserContext,
        query: &str,
        num_insights: Option<usize>,
        stricter: bool,
    ) -> Result<SynthesisOutput, SynthesisError> {
        let num_insights = num_insights.unwrap_or(self.config.num_insights);

        if chunks.is_empty() {
            debug!(query, "No chunks to synthesize from");
            return Ok(SynthesisOutput {
                insights: Vec::new(),
                metadata: json!({
                    "error": "no chunks retrieved; synthesis skipped",
                    "chunk_count": 0,
                    "prompt_version": prompt::SYNTHESIS_PROMPT_VERSION,
                }),
            });
        }

        let system = prompt::synthesis_system(stricter);
        let user = prompt::synthesis_user(chunks, context, query, num_insights);
        let options = CompletionOptions::default()
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let completion = self.client.complete(&system, &user, options).await?;

        let value = extract_json(&completion.text).ok_or_else(|| {
            SynthesisError::UnparsableReply {
                preview: reply_preview(&completion.text),
            }
        })?;

        let (insights, stats) =
            parse_insights(&value, chunks, self.config.min_explanation_chars);

        if stats.total_dropped() > 0 {
            warn!(
                dropped_invalid = stats.dropped_invalid,
                dropped_uncited = stats.dropped_uncited,
                dropped_duplicates = stats.dropped_duplicates,
                dropped_short = stats.dropped_short,
                "Synthesis dropped candidate insights"
            );
        }

        Ok(SynthesisOutput {
            insights,
            metadata: json!({
                "model": completion.model,
                "chunk_count": chunks.len(),
                "prompt_version": prompt::SYNTHESIS_PROMPT_VERSION,
                "requested": num_insights,
                "stricter": stricter,
                "dropped_invalid": stats.dropped_invalid,
                "dropped_uncited": stats.dropped_uncited,
                "dropped_duplicates": stats.dropped_duplicates,
                "dropped_short": stats.dropped_short,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use coachloop_core::error::LlmError;

    fn chunks(sources: &[&str]) -> Vec<RetrievedChunk> {
        sources
            .iter()
            .map(|s| RetrievedChunk {
                id: format!("c-{s}"),
                text: format!("excerpt from {s}"),
                source: (*s).into(),
                url: None,
                published_at: None,
                similarity: 0.8,
                final_score: 0.8,
            })
            .collect()
    }

    fn context() -> UserContext {
        UserContext::new("u1", 3, vec!["ownership".into()])
    }

    const REPLY: &str = r#"{"insights": [{
        "title": "Ownership",
        "explanation": "Every value in the language has exactly one owner, and the value is dropped when the owner goes out of scope.",
        "takeaway": "Prefer borrowing over cloning.",
        "citations": ["The Book"]
    }]}"#;

    #[tokio::test]
    async fn happy_path_produces_insights() {
        let client = Arc::new(ScriptedClient::with_reply(REPLY));
        let synth = Synthesizer::new(client.clone(), SynthesisConfig::default());

        let out = synth
            .synthesize(&chunks(&["The Book"]), &context(), "ownership", None, false)
            .await
            .unwrap();
        assert_eq!(out.insights.len(), 1);
        assert_eq!(out.metadata["chunk_count"], 1);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_chunks_skip_completion_call() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let synth = Synthesizer::new(client.clone(), SynthesisConfig::default());

        let out = synth
            .synthesize(&[], &context(), "ownership", None, false)
            .await
            .unwrap();
        assert!(out.insights.is_empty());
        assert!(out.metadata["error"].as_str().unwrap().contains("no chunks"));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn fenced_reply_is_recovered() {
        let fenced = format!("Here you go:\n```json\n{REPLY}\n```");
        let client = Arc::new(ScriptedClient::with_reply(&fenced));
        let synth = Synthesizer::new(client, SynthesisConfig::default());

        let out = synth
            .synthesize(&chunks(&["The Book"]), &context(), "q", None, false)
            .await
            .unwrap();
        assert_eq!(out.insights.len(), 1);
    }

    #[tokio::test]
    async fn unparsable_reply_is_typed_error() {
        let client = Arc::new(ScriptedClient::with_reply("I could not produce JSON, sorry."));
        let synth = Synthesizer::new(client, SynthesisConfig::default());

        let err = synth
            .synthesize(&chunks(&["The Book"]), &context(), "q", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::UnparsableReply { .. }));
    }

    #[tokio::test]
    async fn completion_failure_surfaces() {
        let client = Arc::new(ScriptedClient::new(vec![Err(LlmError::Timeout(
            "deadline exceeded".into(),
        ))]));
        let synth = Synthesizer::new(client, SynthesisConfig::default());

        let err = synth
            .synthesize(&chunks(&["The Book"]), &context(), "q", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Completion(_)));
    }

    #[tokio::test]
    async fn uncited_insights_recorded_in_metadata() {
        let reply = r#"{"insights": [
            {"title": "Grounded", "explanation": "A long enough explanation that definitely clears the configured minimum character bar.", "takeaway": "A", "citations": ["The Book"]},
            {"title": "Invented", "explanation": "Another long enough explanation that also clears the configured minimum character bar.", "takeaway": "B", "citations": ["Nowhere"]}
        ]}"#;
        let client = Arc::new(ScriptedClient::with_reply(reply));
        let synth = Synthesizer::new(client, SynthesisConfig::default());

        let out = synth
            .synthesize(&chunks(&["The Book"]), &context(), "q", None, false)
            .await
            .unwrap();
        assert_eq!(out.insights.len(), 1);
        assert_eq!(out.metadata["dropped_uncited"], 1);
    }

    #[tokio::test]
    async fn stricter_mode_changes_system_prompt() {
        let client = Arc::new(ScriptedClient::with_reply(REPLY));
        let synth = Synthesizer::new(client.clone(), SynthesisConfig::default());

        synth
            .synthesize(&chunks(&["The Book"]), &context(), "q", None, true)
            .await
            .unwrap();
        assert!(client.last_system_prompt().contains("STRICT MODE"));
    }
}
