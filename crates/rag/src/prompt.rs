//! Prompt templates for synthesis and evaluation.
//!
//! Templates are versioned so stored digest metadata can record which
//! prompt produced it.

use coachloop_core::context::UserContext;
use coachloop_core::digest::{Insight, RetrievedChunk};
use std::fmt::Write;

/// Version tag recorded in digest metadata.
pub const SYNTHESIS_PROMPT_VERSION: &str = "v2";

/// System prompt for insight synthesis.
///
/// The stricter variant is used on the quality-gate retry: it demands that
/// every claim be traceable to the provided excerpts.
pub fn synthesis_system(stricter: bool) -> String {
    let mut prompt = String::from(
        "You are an educational synthesis assistant for a personalized learning coach. \
         You turn retrieved course material and articles into clear, accurate insights \
         tailored to the learner's level.\n\
         \n\
         Quality standards:\n\
         - Ground every insight in the provided source excerpts.\n\
         - Cite the source name for each insight.\n\
         - Match the explanation depth to the learner's difficulty level.\n\
         - Each insight needs a concrete, actionable takeaway.\n",
    );
    if stricter {
        prompt.push_str(
            "\nSTRICT MODE: every factual claim must be directly supported by the \
             excerpts, phrased close to the source wording. Do not generalize beyond \
             what the excerpts state. If the excerpts do not support an insight, \
             produce fewer insights instead of inventing one.\n",
        );
    }
    prompt.push_str(
        "\nReply with JSON only:\n\
         {\"insights\": [{\"title\": \"...\", \"explanation\": \"...\", \
         \"takeaway\": \"...\", \"citations\": [\"source name\"]}]}",
    );
    prompt
}

/// User prompt for insight synthesis: serialized chunks + learner context +
/// requested count.
pub fn synthesis_user(
    chunks: &[RetrievedChunk],
    context: &UserContext,
    query: &str,
    num_insights: usize,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Learner: week {}, {} level, topics: {}",
        context.week,
        context.difficulty,
        context.topics_joined()
    );
    let _ = writeln!(prompt, "Search query: {query}\n");
    let _ = writeln!(prompt, "Source excerpts:");
    for (i, chunk) in chunks.iter().enumerate() {
        let _ = writeln!(prompt, "[{}] source: {}", i + 1, chunk.source);
        let _ = writeln!(prompt, "{}\n", chunk.text);
    }
    let _ = write!(
        prompt,
        "Synthesize exactly {num_insights} insights from these excerpts, \
         personalized for this learner."
    );
    prompt
}

/// System prompt for all judge calls.
pub fn judge_system() -> String {
    "You are a rigorous evaluation judge for retrieval-augmented generation output. \
     You score on a 0.0 to 1.0 scale and reply with JSON only: {\"score\": <float>}."
        .to_string()
}

/// Judge prompt: are the insights' claims entailed by the cited chunks?
pub fn faithfulness_user(insights: &[Insight], chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::from(
        "Score the FAITHFULNESS of these insights: the fraction of their claims \
         directly supported by the source excerpts.\n\nInsights:\n",
    );
    write_insights(&mut prompt, insights);
    prompt.push_str("\nSource excerpts:\n");
    write_chunks(&mut prompt, chunks);
    prompt
}

/// Judge prompt: what fraction of retrieved chunks are relevant to the query?
pub fn context_precision_user(query: &str, chunks: &[RetrievedChunk]) -> String {
    let mut prompt = format!(
        "Score the CONTEXT PRECISION: the fraction of the retrieved excerpts that \
         are relevant to this query.\n\nQuery: {query}\n\nRetrieved excerpts:\n"
    );
    write_chunks(&mut prompt, chunks);
    prompt
}

/// Judge prompt: how much of the needed reference content do the chunks cover?
pub fn context_recall_user(
    query: &str,
    insights: &[Insight],
    chunks: &[RetrievedChunk],
) -> String {
    let mut prompt = format!(
        "Score the CONTEXT RECALL: how completely the retrieved excerpts cover the \
         content needed to answer this query and support these insights.\n\n\
         Query: {query}\n\nInsights:\n"
    );
    write_insights(&mut prompt, insights);
    prompt.push_str("\nRetrieved excerpts:\n");
    write_chunks(&mut prompt, chunks);
    prompt
}

fn write_insights(prompt: &mut String, insights: &[Insight]) {
    for (i, insight) in insights.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "{}. {} — {} (cites: {})",
            i + 1,
            insight.title,
            insight.explanation,
            insight.citations.join(", ")
        );
    }
}

fn write_chunks(prompt: &mut String, chunks: &[RetrievedChunk]) {
    for (i, chunk) in chunks.iter().enumerate() {
        let _ = writeln!(prompt, "[{}] ({}) {}", i + 1, chunk.source, chunk.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: "c1".into(),
            text: text.into(),
            source: source.into(),
            url: None,
            published_at: None,
            similarity: 0.8,
            final_score: 0.8,
        }
    }

    #[test]
    fn stricter_system_prompt_adds_strict_mode() {
        let normal = synthesis_system(false);
        let strict = synthesis_system(true);
        assert!(!normal.contains("STRICT MODE"));
        assert!(strict.contains("STRICT MODE"));
        assert!(strict.contains("\"insights\""));
    }

    #[test]
    fn user_prompt_serializes_chunks_and_context() {
        let mut ctx = coachloop_core::UserContext::new("u1", 5, vec!["async".into()]);
        ctx.difficulty = coachloop_core::Difficulty::Advanced;
        let chunks = vec![chunk("Tokio Docs", "Tasks are lightweight.")];
        let prompt = synthesis_user(&chunks, &ctx, "async tasks", 3);
        assert!(prompt.contains("week 5"));
        assert!(prompt.contains("advanced"));
        assert!(prompt.contains("Tokio Docs"));
        assert!(prompt.contains("Tasks are lightweight."));
        assert!(prompt.contains("exactly 3 insights"));
    }

    #[test]
    fn judge_prompts_name_their_metric() {
        let chunks = vec![chunk("s", "t")];
        let insights = vec![Insight {
            title: "T".into(),
            explanation: "E".into(),
            takeaway: "A".into(),
            citations: vec!["s".into()],
        }];
        assert!(faithfulness_user(&insights, &chunks).contains("FAITHFULNESS"));
        assert!(context_precision_user("q", &chunks).contains("CONTEXT PRECISION"));
        assert!(context_recall_user("q", &insights, &chunks).contains("CONTEXT RECALL"));
    }
}
