//! The RAG digest pipeline for coachloop.
//!
//! Query construction → vector retrieval → insight synthesis → quality
//! evaluation → cached digest. Each stage is a stateless service safely
//! shared across concurrent sessions; the [`digest::DigestGenerator`]
//! sequences them and owns the cache and quality-gate policy.

pub mod digest;
pub mod evaluator;
pub mod parser;
pub mod prompt;
pub mod query;
pub mod retriever;
pub mod synthesizer;

pub use digest::{DigestGenerator, DigestRequest};
pub use evaluator::Evaluator;
pub use query::QueryBuilder;
pub use retriever::Retriever;
pub use synthesizer::{Synthesizer, SynthesisOutput};

#[cfg(test)]
pub(crate) mod testing;
