//! Agent controller — the session state machine around the loop.
//!
//! `run` drives a fresh session from goal to a terminal (or suspended)
//! state; `resume` re-enters a session parked in `awaiting_approval` with a
//! human decision. Approval is never an in-process wait: the controller
//! persists the suspended session and returns, and resumption may happen in
//! a different process hours later.
//!
//! Planner and capability failures never propagate past this boundary; they
//! become a terminal `failed` status on the session.

use crate::executor::StepExecutor;
use crate::planner::Planner;
use coachloop_core::context::UserContext;
use coachloop_core::error::{Error, Result, StoreError};
use coachloop_core::event::{DomainEvent, EventBus};
use coachloop_core::json::reply_preview;
use coachloop_core::session::{
    ApprovalDecision, LogEntry, Phase, Plan, Session, SessionId, SessionStatus, SessionStore,
};
use coachloop_config::AgentConfig;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// What one `run`/`resume` call hands back to the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentRun {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub output: Option<serde_json::Value>,
    pub iterations: u32,
    pub logs: Vec<LogEntry>,
}

impl AgentRun {
    fn from_session(session: &Session) -> Self {
        let output = match session.status {
            SessionStatus::AwaitingApproval => session
                .pending_plan
                .as_ref()
                .and_then(|p| serde_json::to_value(p).ok()),
            _ => session.result.clone(),
        };
        Self {
            session_id: session.id,
            status: session.status,
            output,
            iterations: session.iteration_count(),
            logs: session.log.clone(),
        }
    }
}

pub struct AgentController {
    executor: Arc<StepExecutor>,
    planner: Planner,
    sessions: Arc<dyn SessionStore>,
    events: Arc<EventBus>,
    config: AgentConfig,
}

impl AgentController {
    pub fn new(
        executor: Arc<StepExecutor>,
        planner: Planner,
        sessions: Arc<dyn SessionStore>,
        events: Arc<EventBus>,
        config: AgentConfig,
    ) -> Self {
        Self {
            executor,
            planner,
            sessions,
            events,
            config,
        }
    }

    /// Run a fresh session for a goal until it completes, suspends, or fails.
    pub async fn run(&self, goal: &str, user_id: &str) -> Result<AgentRun> {
        let mut session = Session::new(user_id, goal);
        info!(session_id = %session.id, user_id, goal, "Starting agent session");
        self.events.publish(DomainEvent::SessionStarted {
            session_id: session.id,
            user_id: user_id.to_string(),
            task_preview: reply_preview(goal),
            timestamp: Utc::now(),
        });

        let Some(context) = self.sense(&mut session).await? else {
            return self.seal(session).await;
        };

        let mut last_reflection = None;
        self.drive(&mut session, &context, &mut last_reflection)
            .await?;
        self.seal(session).await
    }

    /// Re-enter a session suspended for approval with the human's decision.
    pub async fn resume(&self, session_id: SessionId, decision: ApprovalDecision) -> Result<AgentRun> {
        let mut session = self
            .sessions
            .load(session_id)
            .await?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

        if session.status != SessionStatus::AwaitingApproval {
            return Err(Error::Internal(format!(
                "session {session_id} is not awaiting approval (status: {:?})",
                session.status
            )));
        }
        let pending = session
            .pending_plan
            .take()
            .ok_or_else(|| Error::Internal(format!("session {session_id} has no pending plan")))?;

        session.status = SessionStatus::Running;
        info!(session_id = %session.id, decision = ?decision, "Resuming suspended session");

        let Some(context) = self.sense(&mut session).await? else {
            return self.seal(session).await;
        };

        let mut last_reflection = None;
        match decision {
            ApprovalDecision::Approved => {
                session.log(Phase::Plan, "approval granted");
                match &pending {
                    Plan::ToolCall { capability, .. } => {
                        session.log(Phase::Act, format!("executing approved {capability}"));
                        let outcome = self.executor.act(session.id, &pending).await;
                        let observation = self.executor.observe(&pending, &outcome);
                        session.log(Phase::Observe, observation.clone());
                        session.record_iteration(pending.clone(), Some(outcome), observation.clone());
                        last_reflection = Some(
                            self.planner
                                .reflect(&pending, &observation, &session.task, &context)
                                .await,
                        );
                    }
                    Plan::PlanApproval { plan } => {
                        let observation = format!("research plan approved: {}", plan.goal);
                        session.log(Phase::Observe, observation.clone());
                        session.record_iteration(pending.clone(), None, observation);
                    }
                    _ => {}
                }
            }
            ApprovalDecision::Rejected { reason } => {
                let observation = format!(
                    "approval denied: {}. Continue with local content only.",
                    reason.as_deref().unwrap_or("no reason given")
                );
                session.log(Phase::Observe, observation.clone());
                session.record_iteration(pending, None, observation);
            }
        }
        self.sessions.save(&session).await?;

        self.drive(&mut session, &context, &mut last_reflection)
            .await?;
        self.seal(session).await
    }

    /// SENSE — load the learner context, failing the session when absent.
    async fn sense(&self, session: &mut Session) -> Result<Option<UserContext>> {
        session.log(Phase::Sense, "loading learner context");
        match self.executor.sense(&session.user_id).await? {
            Some(context) => {
                session.log(
                    Phase::Sense,
                    format!(
                        "week {}, topics: {}, level: {}",
                        context.week,
                        context.topics_joined(),
                        context.difficulty
                    ),
                );
                Ok(Some(context))
            }
            None => {
                warn!(user_id = %session.user_id, "No learner context, failing session");
                session.finish(
                    SessionStatus::Failed,
                    Some(json!({
                        "error": format!("no learner context for '{}'", session.user_id)
                    })),
                );
                Ok(None)
            }
        }
    }

    /// The PLAN → branch → ACT → OBSERVE → REFLECT loop.
    async fn drive(
        &self,
        session: &mut Session,
        context: &UserContext,
        last_reflection: &mut Option<String>,
    ) -> Result<()> {
        let schemas = self.executor.registry().schemas();

        while session.iteration_count() < self.config.max_iterations {
            let plan = match self
                .planner
                .plan(
                    &session.task,
                    context,
                    &schemas,
                    &session.iterations,
                    last_reflection.as_deref(),
                )
                .await
            {
                Ok(plan) => plan,
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "Planning failed, aborting session");
                    self.events.publish(DomainEvent::ErrorOccurred {
                        context: "planner".into(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    session.log(Phase::Plan, format!("planning failed: {e}"));
                    session.finish(
                        SessionStatus::Failed,
                        Some(json!({ "error": e.to_string() })),
                    );
                    return Ok(());
                }
            };
            session.log(Phase::Plan, format!("decided {}", plan.action_type()));

            match plan {
                Plan::Complete {
                    ref summary,
                    ref result,
                } => {
                    let output = json!({ "summary": summary, "result": result });
                    session.record_iteration(plan.clone(), None, "goal complete");
                    session.finish(SessionStatus::Completed, Some(output));
                    return Ok(());
                }
                Plan::Clarify { ref question } => {
                    let output = json!({ "question": question });
                    session.record_iteration(plan.clone(), None, "clarification needed");
                    session.finish(SessionStatus::NeedsClarification, Some(output));
                    return Ok(());
                }
                Plan::PlanApproval { .. } => {
                    self.suspend(session, plan.clone(), "research_plan").await?;
                    return Ok(());
                }
                Plan::ToolCall { ref capability, .. } => {
                    if self.executor.registry().requires_approval(capability) == Some(true) {
                        let name = capability.clone();
                        self.suspend(session, plan.clone(), &name).await?;
                        return Ok(());
                    }

                    session.log(Phase::Act, format!("executing {capability}"));
                    let outcome = self.executor.act(session.id, &plan).await;
                    let observation = self.executor.observe(&plan, &outcome);
                    session.log(Phase::Observe, observation.clone());
                    session.record_iteration(plan.clone(), Some(outcome), observation.clone());

                    let reflection = self
                        .planner
                        .reflect(&plan, &observation, &session.task, context)
                        .await;
                    if !reflection.trim().is_empty() {
                        session.log(Phase::Reflect, reply_preview(&reflection));
                    }
                    *last_reflection = Some(reflection);

                    self.sessions.save(session).await?;
                }
            }
        }

        // Iteration ceiling: return a labeled partial result, never a bare
        // timeout error.
        warn!(
            session_id = %session.id,
            max_iterations = self.config.max_iterations,
            "Iteration ceiling reached, assembling partial result"
        );
        session.log(
            Phase::Reflect,
            "iteration ceiling reached, assembling partial result",
        );
        let output = self.partial_result(session);
        session.finish(SessionStatus::Timeout, Some(output));
        Ok(())
    }

    async fn suspend(&self, session: &mut Session, plan: Plan, capability: &str) -> Result<()> {
        session.log(Phase::Plan, format!("{capability} requires approval, suspending"));
        session.suspend_for_approval(plan);
        self.sessions.save(session).await?;
        self.events.publish(DomainEvent::ApprovalRequested {
            session_id: session.id,
            capability: capability.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Best-effort answer from whatever the run gathered before timing out.
    fn partial_result(&self, session: &Session) -> serde_json::Value {
        let mut sources: Vec<String> = Vec::new();
        let mut push = |s: String| {
            if !s.is_empty() && !sources.contains(&s) {
                sources.push(s);
            }
        };
        for record in &session.iterations {
            let Some(outcome) = &record.outcome else {
                continue;
            };
            if let Some(chunks) = outcome.data.get("chunks").and_then(|c| c.as_array()) {
                for chunk in chunks {
                    if let Some(s) = chunk.get("source").and_then(|s| s.as_str()) {
                        push(s.to_string());
                    }
                }
            }
            if let Some(results) = outcome.data.get("results").and_then(|r| r.as_array()) {
                for result in results {
                    if let Some(url) = result.get("url").and_then(|u| u.as_str()) {
                        push(url.to_string());
                    }
                }
            }
            if let Some(listed) = outcome.data.get("sources").and_then(|s| s.as_array()) {
                for s in listed.iter().filter_map(|s| s.as_str()) {
                    push(s.to_string());
                }
            }
        }

        let progress: Vec<&str> = session
            .iterations
            .iter()
            .map(|r| r.observation.as_str())
            .collect();

        json!({
            "warning": format!(
                "Stopped after {} iterations without completing '{}'. This is a partial result.",
                self.config.max_iterations, session.task
            ),
            "sources": sources,
            "progress": progress,
            "recommendations": [
                "Narrow the goal to a single question or topic",
                "Re-run with force_refresh once more content is indexed",
                "Review the session log to see which step stalled",
            ],
        })
    }

    /// Persist the session and publish its terminal event.
    async fn seal(&self, session: Session) -> Result<AgentRun> {
        self.sessions.save(&session).await?;
        if session.status.is_terminal() {
            let status = serde_json::to_value(session.status)?
                .as_str()
                .unwrap_or("unknown")
                .to_string();
            info!(
                session_id = %session.id,
                status,
                iterations = session.iteration_count(),
                "Session finished"
            );
            self.events.publish(DomainEvent::SessionFinished {
                session_id: session.id,
                status,
                iterations: session.iteration_count(),
                timestamp: Utc::now(),
            });
        }
        Ok(AgentRun::from_session(&session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CannedCapability, ScriptedClient};
    use coachloop_core::capability::CapabilityRegistry;
    use coachloop_core::error::LlmError;
    use coachloop_store::{InMemoryStore, StaticContextProvider};

    const COMPLETE: &str =
        r#"{"action_type": "COMPLETE", "summary": "digest delivered", "result": {"badge": "high"}}"#;
    const CLARIFY: &str = r#"{"action_type": "CLARIFY", "question": "Which topic first?"}"#;

    fn tool_call(capability: &str) -> String {
        format!(
            r#"{{"action_type": "TOOL_CALL", "capability": "{capability}", "arguments": {{}}, "reasoning": "next step"}}"#
        )
    }

    fn ok(s: impl Into<String>) -> std::result::Result<String, LlmError> {
        std::result::Result::Ok(s.into())
    }

    struct Harness {
        controller: AgentController,
        client: Arc<ScriptedClient>,
        store: Arc<InMemoryStore>,
    }

    fn harness(
        registry: CapabilityRegistry,
        replies: Vec<std::result::Result<String, LlmError>>,
        max_iterations: u32,
    ) -> Harness {
        let client = Arc::new(ScriptedClient::new(replies));
        let store = Arc::new(InMemoryStore::new());
        let events = Arc::new(EventBus::default());
        let context_provider = Arc::new(StaticContextProvider::single(UserContext::new(
            "u1",
            3,
            vec!["ownership".into(), "borrowing".into()],
        )));
        let config = AgentConfig {
            max_iterations,
            ..AgentConfig::default()
        };
        let executor = Arc::new(StepExecutor::new(
            Arc::new(registry),
            context_provider,
            events.clone(),
            config.capability_timeout_secs,
        ));
        let planner = Planner::new(client.clone(), config.clone());
        let controller =
            AgentController::new(executor, planner, store.clone(), events, config);
        Harness {
            controller,
            client,
            store,
        }
    }

    #[tokio::test]
    async fn digest_goal_runs_to_completion() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(CannedCapability::new(
            "generate_digest",
            serde_json::json!({"success": true, "num_insights": 3, "badge": "high"}),
        )));
        let h = harness(
            registry,
            vec![
                ok(tool_call("generate_digest")),
                ok("the digest covers this week's topics well"),
                ok(COMPLETE),
            ],
            10,
        );

        let run = h.controller.run("generate my daily digest", "u1").await.unwrap();
        assert_eq!(run.status, SessionStatus::Completed);
        assert_eq!(run.iterations, 2);
        assert_eq!(run.output.as_ref().unwrap()["summary"], "digest delivered");

        // Every phase shows up in the log
        for phase in [Phase::Sense, Phase::Plan, Phase::Act, Phase::Observe, Phase::Reflect] {
            assert!(run.logs.iter().any(|l| l.phase == phase), "missing {phase:?}");
        }

        // Durably persisted in its terminal state
        let stored = h.store.load(run.session_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert!(stored.iterations[0].outcome.as_ref().unwrap().success);
    }

    #[tokio::test]
    async fn clarify_ends_run_with_question() {
        let h = harness(CapabilityRegistry::new(), vec![ok(CLARIFY)], 10);
        let run = h.controller.run("help me", "u1").await.unwrap();
        assert_eq!(run.status, SessionStatus::NeedsClarification);
        assert_eq!(run.output.unwrap()["question"], "Which topic first?");
    }

    #[tokio::test]
    async fn approval_gate_suspends_then_resumes() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(
            CannedCapability::new(
                "web_search",
                serde_json::json!({"count": 1, "results": [{"url": "https://docs.example.org/r"}]}),
            )
            .with_approval(),
        ));
        let h = harness(
            registry,
            vec![
                ok(tool_call("web_search")),
                // resume: reflection on the approved call, then COMPLETE
                ok("the external results fill the gap"),
                ok(COMPLETE),
            ],
            10,
        );

        let run = h.controller.run("research async runtimes", "u1").await.unwrap();
        assert_eq!(run.status, SessionStatus::AwaitingApproval);
        assert_eq!(run.iterations, 0);
        // The pending plan is surfaced so the caller can show it
        assert_eq!(run.output.as_ref().unwrap()["capability"], "web_search");
        assert_eq!(h.client.call_count(), 1);

        let resumed = h
            .controller
            .resume(run.session_id, ApprovalDecision::Approved)
            .await
            .unwrap();
        assert_eq!(resumed.status, SessionStatus::Completed);
        // The approved capability actually executed
        let stored = h.store.load(run.session_id).await.unwrap().unwrap();
        let first = &stored.iterations[0];
        assert!(matches!(first.plan, Plan::ToolCall { ref capability, .. } if capability == "web_search"));
        assert!(first.outcome.as_ref().unwrap().success);
    }

    #[tokio::test]
    async fn rejection_continues_with_local_content() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(
            CannedCapability::new("web_search", serde_json::json!({})).with_approval(),
        ));
        let h = harness(
            registry,
            vec![ok(tool_call("web_search")), ok(COMPLETE)],
            10,
        );

        let run = h.controller.run("research async runtimes", "u1").await.unwrap();
        assert_eq!(run.status, SessionStatus::AwaitingApproval);

        let resumed = h
            .controller
            .resume(
                run.session_id,
                ApprovalDecision::Rejected {
                    reason: Some("stay offline".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(resumed.status, SessionStatus::Completed);
        let stored = h.store.load(run.session_id).await.unwrap().unwrap();
        assert!(stored.iterations[0].observation.contains("stay offline"));
        assert!(stored.iterations[0].outcome.is_none());
    }

    #[tokio::test]
    async fn iteration_ceiling_returns_labeled_partial_result() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Box::new(CannedCapability::new(
            "search_content",
            serde_json::json!({
                "count": 2,
                "chunks": [{"source": "Async Book"}, {"source": "Course Notes"}]
            }),
        )));
        let h = harness(
            registry,
            vec![
                ok(tool_call("search_content")),
                ok("partial progress"),
                ok(tool_call("search_content")),
                ok("partial progress"),
                ok(tool_call("search_content")),
                ok("partial progress"),
            ],
            3,
        );

        let run = h.controller.run("survey everything about async", "u1").await.unwrap();
        assert_eq!(run.status, SessionStatus::Timeout);
        assert_eq!(run.iterations, 3);
        let output = run.output.unwrap();
        assert!(output["warning"].as_str().unwrap().contains("partial"));
        let sources = output["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources.contains(&serde_json::json!("Async Book")));
        assert!(!output["recommendations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn planner_failure_fails_the_session() {
        let h = harness(
            CapabilityRegistry::new(),
            vec![ok("garbage"), ok("more garbage")],
            10,
        );
        let run = h.controller.run("generate my digest", "u1").await.unwrap();
        assert_eq!(run.status, SessionStatus::Failed);
        assert!(run.output.unwrap()["error"].as_str().unwrap().contains("parse"));
    }

    #[tokio::test]
    async fn unknown_user_fails_before_planning() {
        let h = harness(CapabilityRegistry::new(), vec![], 10);
        let run = h.controller.run("generate my digest", "ghost").await.unwrap();
        assert_eq!(run.status, SessionStatus::Failed);
        assert!(run.output.unwrap()["error"].as_str().unwrap().contains("ghost"));
        assert_eq!(h.client.call_count(), 0);
    }

    #[tokio::test]
    async fn resume_of_non_suspended_session_is_an_error() {
        let h = harness(CapabilityRegistry::new(), vec![ok(CLARIFY)], 10);
        let run = h.controller.run("help", "u1").await.unwrap();
        let err = h
            .controller
            .resume(run.session_id, ApprovalDecision::Approved)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not awaiting approval"));
    }

    #[tokio::test]
    async fn resume_of_unknown_session_is_not_found() {
        let h = harness(CapabilityRegistry::new(), vec![], 10);
        let err = h
            .controller
            .resume(SessionId::new_v4(), ApprovalDecision::Approved)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
