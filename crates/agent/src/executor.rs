//! Step executor — the SENSE / ACT / OBSERVE phases of one iteration.
//!
//! The executor is stateless and shared across sessions. It never raises for
//! a capability that misbehaves: unknown names, invalid arguments, timeouts,
//! and internal failures all come back as a failed [`CapabilityOutcome`] so
//! the planner can see the error text and recover on the next iteration.

use coachloop_core::capability::{CapabilityOutcome, CapabilityRegistry};
use coachloop_core::context::{ContextProvider, UserContext};
use coachloop_core::error::{CapabilityError, StoreError};
use coachloop_core::event::{DomainEvent, EventBus};
use coachloop_core::json::reply_preview;
use coachloop_core::session::{Plan, SessionId};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct StepExecutor {
    registry: Arc<CapabilityRegistry>,
    context_provider: Arc<dyn ContextProvider>,
    events: Arc<EventBus>,
    capability_timeout: Duration,
}

impl StepExecutor {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        context_provider: Arc<dyn ContextProvider>,
        events: Arc<EventBus>,
        capability_timeout_secs: u64,
    ) -> Self {
        Self {
            registry,
            context_provider,
            events,
            capability_timeout: Duration::from_secs(capability_timeout_secs),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// SENSE — load the learner's context. Runs once, before iteration 1.
    pub async fn sense(&self, user_id: &str) -> Result<Option<UserContext>, StoreError> {
        let context = self.context_provider.user_context(user_id).await?;
        debug!(user_id, found = context.is_some(), "Sensed learner context");
        Ok(context)
    }

    /// ACT — execute the planned capability.
    ///
    /// Registry-level errors (unknown name, invalid arguments) and timeouts
    /// are absorbed into a failed outcome; the loop keeps going either way.
    pub async fn act(&self, session_id: SessionId, plan: &Plan) -> CapabilityOutcome {
        let Plan::ToolCall {
            capability,
            arguments,
            ..
        } = plan
        else {
            return CapabilityOutcome::failed("act() called with a non-tool plan");
        };

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(
            self.capability_timeout,
            self.registry.execute(capability, arguments.clone()),
        )
        .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(capability, error = %e, "Capability rejected");
                CapabilityOutcome::failed(e.to_string())
            }
            Err(_) => {
                let e = CapabilityError::Timeout {
                    name: capability.clone(),
                    timeout_secs: self.capability_timeout.as_secs(),
                };
                warn!(capability, "Capability timed out");
                CapabilityOutcome::failed(e.to_string())
            }
        };

        self.events.publish(DomainEvent::CapabilityExecuted {
            session_id,
            capability: capability.clone(),
            success: outcome.success,
            duration_ms,
            timestamp: Utc::now(),
        });

        outcome
    }

    /// OBSERVE — summarize the outcome into the text fed back to the planner.
    pub fn observe(&self, plan: &Plan, outcome: &CapabilityOutcome) -> String {
        let capability = match plan {
            Plan::ToolCall { capability, .. } => capability.as_str(),
            _ => "(none)",
        };
        if outcome.success {
            let data = serde_json::to_string(&outcome.data).unwrap_or_default();
            format!("{capability} succeeded: {}", reply_preview(&data))
        } else {
            format!(
                "{capability} failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlakyCapability, SlowCapability};
    use coachloop_store::StaticContextProvider;

    fn executor(registry: CapabilityRegistry, timeout_secs: u64) -> StepExecutor {
        StepExecutor::new(
            Arc::new(registry),
            Arc::new(StaticContextProvider::single(UserContext::new(
                "u1",
                2,
                vec!["ownership".into()],
            ))),
            Arc::new(EventBus::default()),
            timeout_secs,
        )
    }

    #[tokio::test]
    async fn sense_loads_context() {
        let exec = executor(CapabilityRegistry::new(), 5);
        let ctx = exec.sense("u1").await.unwrap().unwrap();
        assert_eq!(ctx.week, 2);
        assert!(exec.sense("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_capability_is_failed_outcome_not_error() {
        let exec = executor(CapabilityRegistry::new(), 5);
        let plan = Plan::ToolCall {
            capability: "no_such_thing".into(),
            arguments: serde_json::json!({}),
            reasoning: String::new(),
        };
        let outcome = exec.act(SessionId::new_v4(), &plan).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("no_such_thing"));
    }

    #[tokio::test]
    async fn internal_failure_is_failed_outcome() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(FlakyCapability));
        let exec = executor(registry, 5);
        let plan = Plan::ToolCall {
            capability: "flaky".into(),
            arguments: serde_json::json!({}),
            reasoning: String::new(),
        };
        let outcome = exec.act(SessionId::new_v4(), &plan).await;
        assert!(!outcome.success);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_capability_times_out() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(SlowCapability));
        let exec = executor(registry, 1);
        let plan = Plan::ToolCall {
            capability: "slow".into(),
            arguments: serde_json::json!({}),
            reasoning: String::new(),
        };
        let outcome = exec.act(SessionId::new_v4(), &plan).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn observe_summarizes_success_and_failure() {
        let exec = executor(CapabilityRegistry::new(), 5);
        let plan = Plan::ToolCall {
            capability: "search_content".into(),
            arguments: serde_json::json!({}),
            reasoning: String::new(),
        };
        let ok = exec.observe(&plan, &CapabilityOutcome::ok(serde_json::json!({"count": 2})));
        assert!(ok.contains("search_content succeeded"));
        assert!(ok.contains("\"count\":2"));

        let bad = exec.observe(&plan, &CapabilityOutcome::failed("boom"));
        assert!(bad.contains("search_content failed: boom"));
    }
}
