//! Search-query construction.
//!
//! Two modes, chosen by whether an explicit question is present:
//! - Q&A mode: the question goes through verbatim, with a one-line
//!   difficulty hint appended.
//! - digest mode: a compact sentence built from the learner's week and
//!   topics. Kept deliberately short; verbose "I am learning X, Y, Z and
//!   need..." phrasing measurably degrades embedding retrieval.

use coachloop_core::context::{Difficulty, UserContext};

/// Upper bound on words in a digest-mode query.
const MAX_QUERY_WORDS: usize = 30;

/// Stateless query builder, shared across sessions.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the search string for a retrieval call.
    pub fn build(&self, context: &UserContext, explicit_question: Option<&str>) -> String {
        match explicit_question {
            Some(question) if !question.trim().is_empty() => {
                self.question_query(question, context.difficulty)
            }
            _ => self.digest_query(context),
        }
    }

    fn question_query(&self, question: &str, difficulty: Difficulty) -> String {
        let hint = match difficulty {
            Difficulty::Beginner => " (explain for a beginner)",
            Difficulty::Intermediate => "",
            Difficulty::Advanced => " (assume advanced background)",
        };
        format!("{}{hint}", question.trim())
    }

    fn digest_query(&self, context: &UserContext) -> String {
        let query = if context.topics.is_empty() {
            format!("week {} {} learning material", context.week, context.difficulty)
        } else {
            format!(
                "{} {} concepts week {}",
                context.topics_joined(),
                context.difficulty,
                context.week
            )
        };
        truncate_words(&query, MAX_QUERY_WORDS)
    }
}

/// Clamp a string to at most `max` whitespace-separated words.
fn truncate_words(text: &str, max: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max {
        text.to_string()
    } else {
        words[..max].join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(topics: Vec<&str>, difficulty: Difficulty) -> UserContext {
        let mut ctx = UserContext::new("u1", 3, topics.into_iter().map(String::from).collect());
        ctx.difficulty = difficulty;
        ctx
    }

    #[test]
    fn question_passes_through_verbatim() {
        let builder = QueryBuilder::new();
        let ctx = context(vec!["ownership"], Difficulty::Intermediate);
        let q = builder.build(&ctx, Some("How does the borrow checker work?"));
        assert_eq!(q, "How does the borrow checker work?");
    }

    #[test]
    fn question_gets_difficulty_hint() {
        let builder = QueryBuilder::new();
        let ctx = context(vec![], Difficulty::Beginner);
        let q = builder.build(&ctx, Some("What is a lifetime?"));
        assert!(q.starts_with("What is a lifetime?"));
        assert!(q.contains("beginner"));
    }

    #[test]
    fn blank_question_falls_back_to_digest_mode() {
        let builder = QueryBuilder::new();
        let ctx = context(vec!["traits"], Difficulty::Intermediate);
        let q = builder.build(&ctx, Some("   "));
        assert!(q.contains("traits"));
        assert!(q.contains("week 3"));
    }

    #[test]
    fn digest_query_is_compact() {
        let builder = QueryBuilder::new();
        let ctx = context(
            vec!["ownership", "borrowing", "lifetimes"],
            Difficulty::Intermediate,
        );
        let q = builder.build(&ctx, None);
        assert!(q.split_whitespace().count() <= 30);
        assert!(q.contains("ownership, borrowing, lifetimes"));
        assert!(!q.contains("I am learning"));
    }

    #[test]
    fn digest_query_without_topics() {
        let builder = QueryBuilder::new();
        let ctx = context(vec![], Difficulty::Advanced);
        let q = builder.build(&ctx, None);
        assert!(q.contains("week 3"));
        assert!(q.contains("advanced"));
    }

    #[test]
    fn long_topic_lists_are_clamped() {
        let topics: Vec<String> = (0..40).map(|i| format!("topic{i}")).collect();
        let ctx = UserContext::new("u1", 1, topics);
        let q = QueryBuilder::new().build(&ctx, None);
        assert!(q.split_whitespace().count() <= 30);
    }
}
