//! Completion and embedding service clients for coachloop.
//!
//! All clients implement the `coachloop_core::CompletionClient` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;
