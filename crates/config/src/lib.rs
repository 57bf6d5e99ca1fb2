//! Configuration loading, validation, and management for coachloop.
//!
//! Loads configuration from `~/.coachloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.coachloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion/embedding provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Retrieval tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Synthesis tuning
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Evaluation / quality-gate tuning
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Digest pipeline settings
    #[serde(default)]
    pub digest: DigestConfig,

    /// Storage backend settings
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for the completion/embedding service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Completion model
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding model
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("retrieval", &self.retrieval)
            .field("synthesis", &self.synthesis)
            .field("evaluation", &self.evaluation)
            .field("agent", &self.agent)
            .field("digest", &self.digest)
            .field("store", &self.store)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// How many chunks to return after re-ranking
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for a chunk to be considered.
    /// Thresholds above ~0.4 starve the pipeline of chunks.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// Weight of raw similarity in the hybrid score
    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f32,

    /// Weight of recency decay in the hybrid score
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f32,

    /// Half-life (days) of the exponential recency decay
    #[serde(default = "default_recency_half_life_days")]
    pub recency_half_life_days: f64,

    /// Soft cap on chunks taken from any single source
    #[serde(default = "default_max_per_source")]
    pub max_per_source: usize,

    /// How many candidates to pull from the backend before re-ranking
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
}

fn default_top_k() -> usize {
    15
}
fn default_min_similarity() -> f32 {
    0.35
}
fn default_similarity_weight() -> f32 {
    0.7
}
fn default_recency_weight() -> f32 {
    0.3
}
fn default_recency_half_life_days() -> f64 {
    30.0
}
fn default_max_per_source() -> usize {
    3
}
fn default_candidate_limit() -> usize {
    50
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            similarity_weight: default_similarity_weight(),
            recency_weight: default_recency_weight(),
            recency_half_life_days: default_recency_half_life_days(),
            max_per_source: default_max_per_source(),
            candidate_limit: default_candidate_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// How many insights to request per digest
    #[serde(default = "default_num_insights")]
    pub num_insights: usize,

    /// Insights with shorter explanations are dropped as low-effort
    #[serde(default = "default_min_explanation_chars")]
    pub min_explanation_chars: usize,

    /// Completion temperature for synthesis
    #[serde(default = "default_synthesis_temperature")]
    pub temperature: f32,

    /// Max tokens for the synthesis reply
    #[serde(default = "default_synthesis_max_tokens")]
    pub max_tokens: u32,
}

fn default_num_insights() -> usize {
    3
}
fn default_min_explanation_chars() -> usize {
    50
}
fn default_synthesis_temperature() -> f32 {
    0.4
}
fn default_synthesis_max_tokens() -> u32 {
    2000
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            num_insights: default_num_insights(),
            min_explanation_chars: default_min_explanation_chars(),
            temperature: default_synthesis_temperature(),
            max_tokens: default_synthesis_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Average score required to pass the quality gate
    #[serde(default = "default_quality_gate_minimum")]
    pub quality_gate_minimum: f64,

    /// Neutral score used when an individual metric call fails
    #[serde(default = "default_metric_fallback_score")]
    pub metric_fallback_score: f64,

    /// Judge temperature (0.0 keeps scoring repeatable)
    #[serde(default)]
    pub judge_temperature: f32,
}

fn default_quality_gate_minimum() -> f64 {
    0.70
}
fn default_metric_fallback_score() -> f64 {
    0.75
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            quality_gate_minimum: default_quality_gate_minimum(),
            metric_fallback_score: default_metric_fallback_score(),
            judge_temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Iteration ceiling before the partial-result fallback kicks in
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Planner temperature
    #[serde(default = "default_planner_temperature")]
    pub planner_temperature: f32,

    /// Per-capability execution timeout in seconds
    #[serde(default = "default_capability_timeout_secs")]
    pub capability_timeout_secs: u64,

    /// Minimum local results before external research is proposed
    #[serde(default = "default_min_db_results")]
    pub min_db_results: usize,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_planner_temperature() -> f32 {
    0.2
}
fn default_capability_timeout_secs() -> u64 {
    120
}
fn default_min_db_results() -> usize {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            planner_temperature: default_planner_temperature(),
            capability_timeout_secs: default_capability_timeout_secs(),
            min_db_results: default_min_db_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Hours before a cached digest goes stale
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: i64,

    /// Retry synthesis once in stricter mode when the quality gate fails
    #[serde(default = "default_true")]
    pub quality_gate_retry: bool,
}

fn default_cache_ttl_hours() -> i64 {
    6
}
fn default_true() -> bool {
    true
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            cache_ttl_hours: default_cache_ttl_hours(),
            quality_gate_retry: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path (ignored by the memory backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            database_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.coachloop/config.toml).
    ///
    /// Also checks environment variables:
    /// - `COACHLOOP_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `COACHLOOP_MODEL` overrides the completion model
    /// - `COACHLOOP_DATABASE` overrides the SQLite path
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("COACHLOOP_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("COACHLOOP_MODEL") {
            config.provider.model = model;
        }

        if let Ok(path) = std::env::var("COACHLOOP_DATABASE") {
            config.store.database_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".coachloop")
    }

    /// Resolve the SQLite database path, defaulting under the config dir.
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("coachloop.db"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(ConfigError::ValidationError(
                "retrieval.min_similarity must be between 0.0 and 1.0".into(),
            ));
        }
        if self.retrieval.min_similarity > 0.4 {
            tracing::warn!(
                min_similarity = self.retrieval.min_similarity,
                "retrieval.min_similarity above 0.4 often returns zero chunks"
            );
        }

        let weight_sum = self.retrieval.similarity_weight + self.retrieval.recency_weight;
        if weight_sum <= 0.0 {
            return Err(ConfigError::ValidationError(
                "similarity_weight + recency_weight must be > 0".into(),
            ));
        }

        if self.retrieval.recency_half_life_days <= 0.0 {
            return Err(ConfigError::ValidationError(
                "retrieval.recency_half_life_days must be positive".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.evaluation.quality_gate_minimum) {
            return Err(ConfigError::ValidationError(
                "evaluation.quality_gate_minimum must be between 0.0 and 1.0".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.synthesis.temperature) {
            return Err(ConfigError::ValidationError(
                "synthesis.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.digest.cache_ttl_hours < 0 {
            return Err(ConfigError::ValidationError(
                "digest.cache_ttl_hours must not be negative".into(),
            ));
        }

        match self.store.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "store.backend must be 'sqlite' or 'memory', got '{other}'"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            retrieval: RetrievalConfig::default(),
            synthesis: SynthesisConfig::default(),
            evaluation: EvaluationConfig::default(),
            agent: AgentConfig::default(),
            digest: DigestConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
