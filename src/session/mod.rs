//! Active conversation state, keyed by session id.
//!
//! The engine only talks to the `SessionStore` trait; the in-memory map is
//! the default backing. In-progress sessions do not survive a restart.

mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SessionError;
use crate::intake::model::Session;

pub use memory::MemorySessionStore;

/// Backend-agnostic session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session by id.
    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionError>;

    /// Insert or replace a session.
    async fn put(&self, session: Session) -> Result<(), SessionError>;

    /// Remove a session. Returns whether it existed.
    async fn delete(&self, session_id: &str) -> Result<bool, SessionError>;

    /// Ids of sessions with no activity for longer than `idle`.
    async fn expired(&self, idle: Duration) -> Result<Vec<String>, SessionError>;

    /// Number of stored sessions.
    async fn len(&self) -> Result<usize, SessionError>;
}
