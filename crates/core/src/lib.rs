//! # coachloop Core
//!
//! Domain types, traits, and error definitions for the coachloop agent
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod capability;
pub mod context;
pub mod digest;
pub mod error;
pub mod event;
pub mod json;
pub mod llm;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use capability::{Capability, CapabilityOutcome, CapabilityRegistry, CapabilitySchema};
pub use context::{ContextProvider, Difficulty, UserContext};
pub use digest::{
    ChunkSearchBackend, Digest, DigestStore, Insight, QualityScore, RetrievedChunk,
};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use llm::{Completion, CompletionClient, CompletionOptions, Usage};
pub use session::{
    ApprovalDecision, IterationRecord, LogEntry, Phase, Plan, ProposedSearch, ResearchPlan,
    Session, SessionId, SessionStatus, SessionStore,
};
