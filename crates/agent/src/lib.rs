//! The coachloop agent loop.
//!
//! Three pieces: the [`StepExecutor`] runs the SENSE/ACT/OBSERVE phases
//! against the capability registry, the [`Planner`] turns goal + history
//! into the next [`coachloop_core::session::Plan`], and the
//! [`AgentController`] is the state machine that drives a durable
//! [`coachloop_core::session::Session`] through them — including the
//! approval suspend/resume split and the partial-result fallback at the
//! iteration ceiling.

pub mod controller;
pub mod executor;
pub mod planner;

pub use controller::{AgentController, AgentRun};
pub use executor::StepExecutor;
pub use planner::Planner;

#[cfg(test)]
pub(crate) mod testing;
