//! Learner context — who the digest is for.
//!
//! Personalization starts here: the current curriculum week, the topics that
//! week covers, and how advanced the learner is. Everything downstream (query
//! building, synthesis prompts, digest metadata) reads from this snapshot.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Self-reported learner level, used to tune synthesis tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Advanced => write!(f, "advanced"),
        }
    }
}

/// A snapshot of one learner's current position in the curriculum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    /// Learner identifier
    pub user_id: String,

    /// Current curriculum week (1-based)
    pub week: u32,

    /// Topics covered this week
    pub topics: Vec<String>,

    /// Self-reported level
    #[serde(default)]
    pub difficulty: Difficulty,

    /// Free-form preferences (tone, format, focus areas)
    #[serde(default)]
    pub preferences: serde_json::Map<String, serde_json::Value>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, week: u32, topics: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            week,
            topics,
            difficulty: Difficulty::default(),
            preferences: serde_json::Map::new(),
        }
    }

    /// Topics joined for prompt interpolation ("ownership, borrowing, traits").
    pub fn topics_joined(&self) -> String {
        self.topics.join(", ")
    }
}

/// Source of learner context snapshots.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Fetch the context for a learner. `Ok(None)` when the learner is unknown.
    async fn user_context(
        &self,
        user_id: &str,
    ) -> std::result::Result<Option<UserContext>, StoreError>;
}
