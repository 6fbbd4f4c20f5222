//! In-memory session store, used when no database is wanted (dry runs,
//! tests, the controller's default).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::{SessionStatus, SimulationSession};
use crate::domain::ports::SessionStore;

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, SimulationSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &SimulationSession) -> SimulationResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(SimulationError::ValidationFailed(format!(
                "session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> SimulationResult<Option<SimulationSession>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn update(&self, session: &SimulationSession) -> SimulationResult<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(slot) => {
                *slot = session.clone();
                Ok(())
            }
            None => Err(SimulationError::SessionNotFound(session.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> SimulationResult<()> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(SimulationError::SessionNotFound(id))
    }

    async fn list(
        &self,
        status: Option<SessionStatus>,
        limit: usize,
    ) -> SimulationResult<Vec<SimulationSession>> {
        let sessions = self.sessions.read().await;
        let mut found: Vec<SimulationSession> = sessions
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }
}
