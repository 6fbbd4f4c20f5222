/// Domain models for simulation sessions.
///
/// A session is the stored handle for one run: created when the controller
/// starts, updated with the final artifact when it stops.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::run::{RunArtifact, StopReason};

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Run in progress
    Running,
    /// Run stopped on its own terms (threshold, step cap, user stop)
    Completed,
    /// Run ended because the agent under test failed
    Failed,
    /// Run cancelled externally
    Cancelled,
}

impl SessionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl From<StopReason> for SessionStatus {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::AgentUnavailable => Self::Failed,
            StopReason::Cancelled => Self::Cancelled,
            _ => Self::Completed,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored record of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSession {
    /// Run identifier, shared with the artifact
    pub id: Uuid,

    /// Persona seed text
    pub seed: String,

    /// Current lifecycle status
    pub status: SessionStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Final artifact, present once the run has stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<RunArtifact>,
}

impl SimulationSession {
    /// Creates a running session
    pub fn new(id: Uuid, seed: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            seed: seed.into(),
            status: SessionStatus::Running,
            created_at: now,
            updated_at: now,
            artifact: None,
        }
    }

    /// Attach the final artifact and derive the status from its stop reason
    pub fn finish(&mut self, artifact: RunArtifact) {
        self.status = artifact.stop_reason.into();
        self.updated_at = Utc::now();
        self.artifact = Some(artifact);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            SessionStatus::Running,
            SessionStatus::Completed,
            SessionStatus::Failed,
            SessionStatus::Cancelled,
        ] {
            assert_eq!(SessionStatus::parse_str(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse_str("bogus"), None);
    }

    #[test]
    fn test_status_from_stop_reason() {
        assert_eq!(SessionStatus::from(StopReason::Positive), SessionStatus::Completed);
        assert_eq!(SessionStatus::from(StopReason::AgentUnavailable), SessionStatus::Failed);
        assert_eq!(SessionStatus::from(StopReason::Cancelled), SessionStatus::Cancelled);
    }
}
