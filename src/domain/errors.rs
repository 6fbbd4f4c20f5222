//! Domain errors for the mimic simulation harness.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can surface from the simulation core.
///
/// Most oracle failures never escape the services that hit them: they are
/// degraded locally and recorded as a [`Degradation`](crate::domain::models::Degradation).
/// Only agent failures and cancellation end a run early.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Oracle call timed out after {0:?}")]
    OracleTimeout(Duration),

    #[error("Oracle returned a malformed response: {0}")]
    OracleMalformedResponse(String),

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Agent under test unavailable: {0}")]
    AgentUnavailable(String),

    #[error("Judge rejected the draft after {attempts} attempts (last score {last_score:.2})")]
    JudgeRejectedMaxRetries { attempts: u32, last_score: f64 },

    #[error("Simulation cancelled")]
    Cancelled,

    #[error("Run aborted: {0}")]
    RunAborted(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SimulationError {
    /// Whether a fresh attempt of the same call could succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OracleTimeout(_) | Self::OracleMalformedResponse(_) | Self::OracleUnavailable(_)
        )
    }
}

pub type SimulationResult<T> = Result<T, SimulationError>;

impl From<sqlx::Error> for SimulationError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SimulationError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
