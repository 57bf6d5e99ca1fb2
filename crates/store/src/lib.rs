//! Storage backends for coachloop.
//!
//! Three concerns live here, each behind a core trait:
//! - chunk search (`ChunkSearchBackend`) — vector similarity over indexed content
//! - session persistence (`SessionStore`) — durable agent sessions
//! - digest persistence (`DigestStore`) — (user, date)-keyed digests with upsert
//!
//! Two implementations are provided: an in-memory backend for tests and
//! demos, and a SQLite backend for production.

pub mod memory;
pub mod sqlite;
pub mod vector;

pub use memory::{InMemoryStore, StaticContextProvider};
pub use sqlite::SqliteStore;
