//! Domain models for the simulation core.

pub mod config;
pub mod emotion;
pub mod persona;
pub mod run;
pub mod session;
pub mod summary;
pub mod turn;
pub mod ui_state;
pub mod verdict;

pub use config::{
    AgentConfig, BatchConfig, Config, EmotionConfig, EventsConfig, JudgeConfig, LogConfig,
    LogFormat, MemoryConfig, OracleConfig, PersonaConfig, RotationPolicy, SimulationConfig,
    StoreConfig, MAX_STEPS_HARD_CAP,
};
pub use emotion::{EmotionDelta, EmotionScores, StopChannel, StopResult, Thresholds};
pub use persona::{PersonaFacet, PersonaProfile};
pub use run::{ControllerState, RunArtifact, StopReason, ARTIFACT_SCHEMA_VERSION};
pub use session::{SessionStatus, SimulationSession};
pub use summary::ConversationSummary;
pub use turn::{AcceptedTurn, Degradation, EmotionAssessment, TurnRecord};
pub use ui_state::{
    Action, Card, FilterValue, UiState, View, VisibleWindow, MAX_MILEAGE, MILEAGE_FILTER_ID,
};
pub use verdict::{JudgeVerdict, DEFAULT_PASS_THRESHOLD};
