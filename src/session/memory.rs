use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::SessionStore;
use crate::error::SessionError;
use crate::intake::model::Session;

/// Process-local session map.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn put(&self, session: Session) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, SessionError> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn expired(&self, idle: Duration) -> Result<Vec<String>, SessionError> {
        let idle = chrono::Duration::from_std(idle)
            .map_err(|e| SessionError::Unavailable(format!("idle duration out of range: {e}")))?;
        let cutoff = Utc::now() - idle;

        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.last_activity < cutoff)
            .map(|s| s.session_id.clone())
            .collect())
    }

    async fn len(&self) -> Result<usize, SessionError> {
        Ok(self.sessions.read().await.len())
    }
}
