//! Agent sessions — the durable record of one task execution.
//!
//! A session captures everything about a single run of the agent loop: the
//! task, every iteration's plan and outcome, the phase-tagged log, and the
//! terminal (or suspended) status. Sessions are persisted through
//! [`SessionStore`] so an approval pause can span process restarts — the
//! loop never suspends in-process waiting for a human.

use crate::capability::CapabilityOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use async_trait::async_trait;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Where a session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The loop is (or may be) actively iterating
    Running,
    /// Suspended, waiting for a human approval decision
    AwaitingApproval,
    /// Finished with a final result
    Completed,
    /// Finished by asking the user a clarifying question
    NeedsClarification,
    /// Hit the iteration ceiling; carries a partial result
    Timeout,
    /// Aborted by an unrecoverable error
    Failed,
}

impl SessionStatus {
    /// Terminal states cannot transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed
                | SessionStatus::NeedsClarification
                | SessionStatus::Timeout
                | SessionStatus::Failed
        )
    }
}

/// The phase of the loop a log entry was emitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Sense,
    Plan,
    Act,
    Observe,
    Reflect,
}

/// One timestamped, phase-tagged log line in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub phase: Phase,
    pub detail: String,
    /// Which iteration emitted this entry (0 before the loop starts)
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
}

/// A single proposed web search inside a research plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedSearch {
    /// The query to run
    pub query: String,

    /// Why this search helps the task
    pub rationale: String,
}

/// A plan of external research that needs human sign-off before running.
///
/// Produced when local retrieval comes back too thin and the agent wants to
/// go to the web instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    /// What the research aims to establish
    pub goal: String,

    /// The searches the agent proposes to run
    pub searches: Vec<ProposedSearch>,
}

/// The planner's decision for one iteration.
///
/// This is a closed set: every model reply is coerced into exactly one of
/// these variants or rejected at the parse boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    /// Invoke a capability with the given arguments.
    ToolCall {
        capability: String,
        #[serde(default)]
        arguments: serde_json::Value,
        #[serde(default)]
        reasoning: String,
    },

    /// The task is done; here is the final answer.
    Complete {
        summary: String,
        #[serde(default)]
        result: serde_json::Value,
    },

    /// The task is ambiguous; ask the user this question.
    Clarify { question: String },

    /// Propose a research plan that requires human approval.
    PlanApproval { plan: ResearchPlan },
}

impl Plan {
    /// Short tag for logging.
    pub fn action_type(&self) -> &'static str {
        match self {
            Plan::ToolCall { .. } => "TOOL_CALL",
            Plan::Complete { .. } => "COMPLETE",
            Plan::Clarify { .. } => "CLARIFY",
            Plan::PlanApproval { .. } => "PLAN_APPROVAL",
        }
    }
}

/// A human's verdict on a pending approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// The full record of one loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number
    pub iteration: u32,

    /// What the planner decided
    pub plan: Plan,

    /// The capability outcome, when the plan was a tool call that ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CapabilityOutcome>,

    /// The observation fed back into the next planning round
    pub observation: String,

    pub timestamp: DateTime<Utc>,
}

/// One agent task execution, durable end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// Which learner this session belongs to
    pub user_id: String,

    /// The task the agent was asked to perform
    pub task: String,

    pub status: SessionStatus,

    /// Every iteration so far, in order
    #[serde(default)]
    pub iterations: Vec<IterationRecord>,

    /// Phase-tagged execution log
    #[serde(default)]
    pub log: Vec<LogEntry>,

    /// The plan waiting on approval, when status is `AwaitingApproval`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_plan: Option<Plan>,

    /// Final (or partial) result payload for terminal states
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, task: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            task: task.into(),
            status: SessionStatus::Running,
            iterations: Vec::new(),
            log: Vec::new(),
            pending_plan: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a phase-tagged log entry and touch `updated_at`.
    pub fn log(&mut self, phase: Phase, detail: impl Into<String>) {
        let now = Utc::now();
        let iteration = self.iterations.len() as u32;
        self.log.push(LogEntry {
            phase,
            detail: detail.into(),
            iteration,
            timestamp: now,
        });
        self.updated_at = now;
    }

    /// Record a completed iteration.
    pub fn record_iteration(
        &mut self,
        plan: Plan,
        outcome: Option<CapabilityOutcome>,
        observation: impl Into<String>,
    ) {
        let now = Utc::now();
        self.iterations.push(IterationRecord {
            iteration: self.iterations.len() as u32 + 1,
            plan,
            outcome,
            observation: observation.into(),
            timestamp: now,
        });
        self.updated_at = now;
    }

    /// Suspend this session pending a human decision on `plan`.
    pub fn suspend_for_approval(&mut self, plan: Plan) {
        self.pending_plan = Some(plan);
        self.status = SessionStatus::AwaitingApproval;
        self.updated_at = Utc::now();
    }

    /// Move to a terminal state with an optional result payload.
    pub fn finish(&mut self, status: SessionStatus, result: Option<serde_json::Value>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.result = result;
        self.pending_plan = None;
        self.updated_at = Utc::now();
    }

    pub fn iteration_count(&self) -> u32 {
        self.iterations.len() as u32
    }
}

/// Durable session persistence.
///
/// `save` overwrites by id; callers save after every status change so a
/// crash never loses more than the in-flight iteration.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> std::result::Result<(), StoreError>;

    async fn load(&self, id: SessionId) -> std::result::Result<Option<Session>, StoreError>;
}
