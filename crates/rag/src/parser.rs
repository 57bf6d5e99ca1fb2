//! Tolerant insight parsing and validation.
//!
//! Models drift on field names and discipline, so parsing normalizes
//! common variants, validates required fields, and drops candidates that
//! fail the grounding invariant: every insight must cite a source that was
//! actually retrieved in the same call.

use coachloop_core::digest::{Insight, RetrievedChunk};
use serde_json::Value;
use std::collections::HashSet;

/// What the parser dropped and why, surfaced in digest metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Candidates missing a required field or with wrong types
    pub dropped_invalid: usize,
    /// Candidates citing no retrieved source
    pub dropped_uncited: usize,
    /// Candidates with a title already seen
    pub dropped_duplicates: usize,
    /// Candidates with explanations below the minimum length
    pub dropped_short: usize,
}

impl ParseStats {
    pub fn total_dropped(&self) -> usize {
        self.dropped_invalid + self.dropped_uncited + self.dropped_duplicates + self.dropped_short
    }
}

/// Parse and validate insights from an extracted JSON reply.
///
/// Accepts either `{"insights": [...]}` or a bare array. Surviving insights
/// keep only citations matching retrieved sources.
pub fn parse_insights(
    value: &Value,
    chunks: &[RetrievedChunk],
    min_explanation_chars: usize,
) -> (Vec<Insight>, ParseStats) {
    let mut stats = ParseStats::default();

    let candidates = match value.get("insights").and_then(|v| v.as_array()) {
        Some(array) => array.as_slice(),
        None => match value.as_array() {
            Some(array) => array.as_slice(),
            None => return (Vec::new(), stats),
        },
    };

    let known_sources: HashSet<String> = chunks
        .iter()
        .map(|c| normalize_source(&c.source))
        .collect();

    let mut seen_titles = HashSet::new();
    let mut insights = Vec::new();

    for candidate in candidates {
        let Some(mut insight) = extract_fields(candidate) else {
            stats.dropped_invalid += 1;
            continue;
        };

        if insight.explanation.chars().count() < min_explanation_chars {
            stats.dropped_short += 1;
            continue;
        }

        // Grounding invariant: keep only citations that resolve to a
        // retrieved chunk; an insight with none left is dropped, not kept.
        insight
            .citations
            .retain(|c| known_sources.contains(&normalize_source(c)));
        if insight.citations.is_empty() {
            stats.dropped_uncited += 1;
            continue;
        }

        let title_key = insight.title.trim().to_lowercase();
        if !seen_titles.insert(title_key) {
            stats.dropped_duplicates += 1;
            continue;
        }

        insights.push(insight);
    }

    (insights, stats)
}

/// Pull the required fields out of one candidate, accepting common
/// field-name variants.
fn extract_fields(candidate: &Value) -> Option<Insight> {
    let obj = candidate.as_object()?;

    let title = string_field(obj, &["title", "headline", "heading"])?;
    let explanation = string_field(obj, &["explanation", "content", "summary", "body"])?;
    let takeaway = string_field(obj, &["takeaway", "practical_takeaway", "action", "application"])?;
    let citations = citations_field(obj)?;

    Some(Insight {
        title,
        explanation,
        takeaway,
        citations,
    })
}

fn string_field(
    obj: &serde_json::Map<String, Value>,
    names: &[&str],
) -> Option<String> {
    names
        .iter()
        .find_map(|name| obj.get(*name).and_then(|v| v.as_str()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Citations may arrive as an array of strings or a bare string.
fn citations_field(obj: &serde_json::Map<String, Value>) -> Option<Vec<String>> {
    for name in ["citations", "sources", "source"] {
        match obj.get(name) {
            Some(Value::Array(items)) => {
                let citations: Vec<String> = items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                return Some(citations);
            }
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return Some(vec![s.trim().to_string()]);
            }
            _ => continue,
        }
    }
    None
}

fn normalize_source(source: &str) -> String {
    source.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunks(sources: &[&str]) -> Vec<RetrievedChunk> {
        sources
            .iter()
            .map(|s| RetrievedChunk {
                id: format!("c-{s}"),
                text: "text".into(),
                source: (*s).into(),
                url: None,
                published_at: None,
                similarity: 0.8,
                final_score: 0.8,
            })
            .collect()
    }

    const LONG: &str = "A sufficiently long explanation of the concept that clears the minimum length bar easily.";

    #[test]
    fn valid_insight_parses() {
        let value = json!({"insights": [{
            "title": "Ownership",
            "explanation": LONG,
            "takeaway": "Prefer borrowing.",
            "citations": ["The Book"]
        }]});
        let (insights, stats) = parse_insights(&value, &chunks(&["The Book"]), 50);
        assert_eq!(insights.len(), 1);
        assert_eq!(stats.total_dropped(), 0);
    }

    #[test]
    fn field_name_variants_normalize() {
        let value = json!({"insights": [{
            "headline": "Traits",
            "content": LONG,
            "action": "Use trait bounds.",
            "sources": ["The Book"]
        }]});
        let (insights, _) = parse_insights(&value, &chunks(&["The Book"]), 50);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].title, "Traits");
        assert_eq!(insights[0].takeaway, "Use trait bounds.");
    }

    #[test]
    fn bare_string_citation_accepted() {
        let value = json!({"insights": [{
            "title": "T",
            "explanation": LONG,
            "takeaway": "A",
            "source": "The Book"
        }]});
        let (insights, _) = parse_insights(&value, &chunks(&["The Book"]), 50);
        assert_eq!(insights[0].citations, vec!["The Book"]);
    }

    #[test]
    fn uncited_insight_is_dropped() {
        let value = json!({"insights": [{
            "title": "Hallucinated",
            "explanation": LONG,
            "takeaway": "A",
            "citations": ["Some Blog Nobody Retrieved"]
        }]});
        let (insights, stats) = parse_insights(&value, &chunks(&["The Book"]), 50);
        assert!(insights.is_empty());
        assert_eq!(stats.dropped_uncited, 1);
    }

    #[test]
    fn mixed_citations_keep_only_retrieved() {
        let value = json!({"insights": [{
            "title": "T",
            "explanation": LONG,
            "takeaway": "A",
            "citations": ["The Book", "Unknown Blog"]
        }]});
        let (insights, _) = parse_insights(&value, &chunks(&["The Book"]), 50);
        assert_eq!(insights[0].citations, vec!["The Book"]);
    }

    #[test]
    fn citation_match_ignores_case_and_whitespace() {
        let value = json!({"insights": [{
            "title": "T",
            "explanation": LONG,
            "takeaway": "A",
            "citations": ["  the book "]
        }]});
        let (insights, _) = parse_insights(&value, &chunks(&["The Book"]), 50);
        assert_eq!(insights.len(), 1);
    }

    #[test]
    fn duplicate_titles_deduped() {
        let insight = json!({
            "title": "Same Title",
            "explanation": LONG,
            "takeaway": "A",
            "citations": ["The Book"]
        });
        let value = json!({"insights": [insight.clone(), insight]});
        let (insights, stats) = parse_insights(&value, &chunks(&["The Book"]), 50);
        assert_eq!(insights.len(), 1);
        assert_eq!(stats.dropped_duplicates, 1);
    }

    #[test]
    fn short_explanations_dropped() {
        let value = json!({"insights": [{
            "title": "T",
            "explanation": "Too short.",
            "takeaway": "A",
            "citations": ["The Book"]
        }]});
        let (insights, stats) = parse_insights(&value, &chunks(&["The Book"]), 50);
        assert!(insights.is_empty());
        assert_eq!(stats.dropped_short, 1);
    }

    #[test]
    fn missing_required_field_dropped() {
        let value = json!({"insights": [{
            "title": "T",
            "takeaway": "A",
            "citations": ["The Book"]
        }]});
        let (insights, stats) = parse_insights(&value, &chunks(&["The Book"]), 50);
        assert!(insights.is_empty());
        assert_eq!(stats.dropped_invalid, 1);
    }

    #[test]
    fn bare_array_accepted() {
        let value = json!([{
            "title": "T",
            "explanation": LONG,
            "takeaway": "A",
            "citations": ["The Book"]
        }]);
        let (insights, _) = parse_insights(&value, &chunks(&["The Book"]), 50);
        assert_eq!(insights.len(), 1);
    }

    #[test]
    fn non_array_reply_yields_nothing() {
        let (insights, stats) = parse_insights(&json!({"oops": true}), &chunks(&["s"]), 50);
        assert!(insights.is_empty());
        assert_eq!(stats.total_dropped(), 0);
    }
}
