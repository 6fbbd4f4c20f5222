//! Run lifecycle and the externally consumed run artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::emotion::{StopChannel, StopResult, Thresholds};
use super::persona::PersonaProfile;
use super::turn::TurnRecord;

/// Version of the [`RunArtifact`] layout. Bumped only on breaking changes.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Positive accumulator crossed its threshold.
    Positive,
    /// Negative accumulator crossed its threshold.
    Negative,
    MaxStepsReached,
    AgentUnavailable,
    Cancelled,
    /// The simulated user emitted a stop action.
    UserEnded,
}

impl StopReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::MaxStepsReached => "max_steps_reached",
            Self::AgentUnavailable => "agent_unavailable",
            Self::Cancelled => "cancelled",
            Self::UserEnded => "user_ended",
        }
    }

    /// Whether the run ended on its own terms rather than through a failure.
    pub const fn is_natural(&self) -> bool {
        !matches!(self, Self::AgentUnavailable | Self::Cancelled)
    }
}

impl From<StopChannel> for StopReason {
    fn from(channel: StopChannel) -> Self {
        match channel {
            StopChannel::Positive => Self::Positive,
            StopChannel::Negative => Self::Negative,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controller lifecycle: `Init -> Running -> Finished(reason)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Init,
    Running { step: u32 },
    Finished(StopReason),
}

impl ControllerState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Complete, replayable output of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifact {
    pub schema_version: u32,
    pub run_id: Uuid,
    pub seed: String,
    pub persona_profile: PersonaProfile,
    pub thresholds: Thresholds,
    pub gamma: f64,
    pub turns: Vec<TurnRecord>,
    pub stop_reason: StopReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_result: Option<StopResult>,
    pub steps_used: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunArtifact {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
