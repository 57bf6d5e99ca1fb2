//! Error types for the coachloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all coachloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Capability errors ---
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    // --- Completion/embedding service errors ---
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Synthesis errors ---
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    // --- Evaluation errors ---
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    // --- Planner errors ---
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    // --- Storage errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Capability not found: {0}")]
    NotFound(String),

    #[error("Invalid input for {name}: {reason}")]
    InvalidInput { name: String, reason: String },

    #[error("Capability execution failed: {name} — {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error("Capability timed out: {name} after {timeout_secs}s")]
    Timeout { name: String, timeout_secs: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider returned empty content: {0}")]
    EmptyResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Vector search failed: {0}")]
    SearchFailed(String),
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Completion service failed: {0}")]
    Completion(#[from] LlmError),

    #[error("Could not extract valid JSON from model reply: {preview}")]
    UnparsableReply { preview: String },

    #[error("Model reply missing '{0}' field")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Metric '{metric}' failed: {reason}")]
    MetricFailed { metric: String, reason: String },

    #[error("Nothing to evaluate: {0}")]
    EmptyInput(&'static str),
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Could not parse plan from model reply: {preview}")]
    Unparsable { preview: String },

    #[error("Unknown action type: {0}")]
    UnknownAction(String),

    #[error("Plan missing required field '{field}' for {action}")]
    MissingField { action: String, field: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_displays_correctly() {
        let err = Error::Llm(LlmError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn capability_error_displays_correctly() {
        let err = Error::Capability(CapabilityError::InvalidInput {
            name: "generate_digest".into(),
            reason: "missing 'user_id'".into(),
        });
        assert!(err.to_string().contains("generate_digest"));
        assert!(err.to_string().contains("user_id"));
    }

    #[test]
    fn plan_error_from_conversion() {
        let err: Error = PlanError::UnknownAction("DANCE".into()).into();
        assert!(matches!(err, Error::Plan(_)));
        assert!(err.to_string().contains("DANCE"));
    }
}
