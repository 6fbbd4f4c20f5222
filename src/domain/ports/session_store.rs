/// Session store port (trait) for dependency injection.
///
/// Defines the contract for simulation session storage. The controller
/// receives a store explicitly; there is no process-wide session map.
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::SimulationResult;
use crate::domain::models::{SessionStatus, SimulationSession};

/// Store trait for simulation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a new session
    ///
    /// # Errors
    /// Returns error if:
    /// - Session ID already exists
    /// - Storage backend fails
    async fn create(&self, session: &SimulationSession) -> SimulationResult<()>;

    /// Retrieves session by ID
    ///
    /// # Returns
    /// - `Some(SimulationSession)` if found
    /// - `None` if not found
    async fn get(&self, id: Uuid) -> SimulationResult<Option<SimulationSession>>;

    /// Updates an existing session
    ///
    /// # Errors
    /// Returns `SessionNotFound` if the session does not exist
    async fn update(&self, session: &SimulationSession) -> SimulationResult<()>;

    /// Deletes a session
    ///
    /// # Errors
    /// Returns `SessionNotFound` if the session does not exist
    async fn delete(&self, id: Uuid) -> SimulationResult<()>;

    /// Lists sessions, newest first
    ///
    /// # Arguments
    /// - `status`: Optional status filter
    /// - `limit`: Maximum number of results
    async fn list(
        &self,
        status: Option<SessionStatus>,
        limit: usize,
    ) -> SimulationResult<Vec<SimulationSession>>;
}
