//! Capability trait — the abstraction over agent tools.
//!
//! Capabilities are what give the agent the ability to act: fetch a
//! learner's context, run a vector search, generate a digest, search the
//! web. Each capability declares a JSON Schema for its input, a description
//! of its output, and whether invoking it requires explicit human approval.

use crate::error::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The result of a capability invocation.
///
/// Every invocation produces exactly one of these — success with data, or
/// failure with an error message. The registry converts capability-internal
/// failures into a failed outcome so a single bad tool never aborts a loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityOutcome {
    /// Whether the capability executed successfully
    pub success: bool,

    /// Structured output data
    pub data: serde_json::Value,

    /// Error message when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapabilityOutcome {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// A capability's declared interface, sent to the planner LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySchema {
    /// Unique capability name (e.g., "generate_digest")
    pub name: String,

    /// Description of what the capability does
    pub description: String,

    /// JSON Schema describing the input arguments
    pub input_schema: serde_json::Value,

    /// Field-level description of the output shape
    pub output_schema: serde_json::Value,

    /// Whether invocation must be approved by a human first
    #[serde(default)]
    pub requires_approval: bool,
}

/// The core Capability trait.
///
/// Each capability implements this trait and is registered in the
/// [`CapabilityRegistry`], which validates arguments and dispatches
/// execution on behalf of the agent loop.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The unique name of this capability.
    fn name(&self) -> &str;

    /// A description of what this capability does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this capability's input arguments.
    fn input_schema(&self) -> serde_json::Value;

    /// Field descriptions for the output shape.
    fn output_schema(&self) -> serde_json::Value;

    /// Whether this capability needs explicit human approval before running.
    fn requires_approval(&self) -> bool {
        false
    }

    /// Execute the capability with validated arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<CapabilityOutcome, CapabilityError>;

    /// Convert this capability into its declared schema.
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
            output_schema: self.output_schema(),
            requires_approval: self.requires_approval(),
        }
    }
}

/// A registry of available capabilities.
///
/// The agent loop uses this to:
/// 1. Get capability schemas to embed in the planning prompt
/// 2. Look up, validate, and execute capabilities when the planner requests them
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Box<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability. Replaces any existing capability with the same name.
    pub fn register(&mut self, capability: Box<dyn Capability>) {
        let name = capability.name().to_string();
        self.capabilities.insert(name, capability);
    }

    /// Get a capability by name.
    pub fn get(&self, name: &str) -> Option<&dyn Capability> {
        self.capabilities.get(name).map(|c| c.as_ref())
    }

    /// Get all capability schemas (for embedding in the planning prompt).
    pub fn schemas(&self) -> Vec<CapabilitySchema> {
        let mut schemas: Vec<_> = self.capabilities.values().map(|c| c.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Whether the named capability requires approval. `None` if unregistered.
    pub fn requires_approval(&self, name: &str) -> Option<bool> {
        self.capabilities.get(name).map(|c| c.requires_approval())
    }

    /// List all registered capability names.
    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(|s| s.as_str()).collect()
    }

    /// Execute a capability by name.
    ///
    /// Fails with [`CapabilityError::NotFound`] for unregistered names and
    /// [`CapabilityError::InvalidInput`] when arguments don't satisfy the
    /// declared input schema. Capability-internal failures are caught and
    /// converted to a failed [`CapabilityOutcome`] — the registry never
    /// raises for them.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<CapabilityOutcome, CapabilityError> {
        let capability = self
            .capabilities
            .get(name)
            .ok_or_else(|| CapabilityError::NotFound(name.to_string()))?;

        if let Err(reason) = validate_arguments(&capability.input_schema(), &arguments) {
            return Err(CapabilityError::InvalidInput {
                name: name.to_string(),
                reason,
            });
        }

        match capability.execute(arguments).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(capability = name, error = %e, "Capability execution failed");
                Ok(CapabilityOutcome::failed(e.to_string()))
            }
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate arguments against a (subset of) JSON Schema.
///
/// Checks that `arguments` is an object, that every property listed in the
/// schema's `required` array is present, and that present properties match
/// their declared primitive `type`. Deeper validation is left to the
/// capability itself.
pub fn validate_arguments(
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> std::result::Result<(), String> {
    let args = arguments
        .as_object()
        .ok_or_else(|| "arguments must be a JSON object".to_string())?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            if !args.contains_key(field) {
                return Err(format!("missing required field '{field}'"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in args {
            let Some(declared) = properties.get(key) else {
                continue; // unknown extras are tolerated
            };
            let Some(expected) = declared.get("type").and_then(|t| t.as_str()) else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !matches {
                return Err(format!("field '{key}' must be of type {expected}"));
            }
        }
    }

    Ok(())
}
