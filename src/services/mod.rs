//! Core simulation services.

pub mod alignment_judge;
pub mod batch_runner;
pub mod conversation_memory;
pub mod emotion_scorer;
pub mod oracle_gateway;
pub mod persona_builder;
pub mod prompts;
pub mod simulation_controller;
pub mod turn_drafter;
pub mod ui_executor;

pub use alignment_judge::{AlignmentJudge, JudgeInput};
pub use batch_runner::{BatchOutcome, BatchRunner};
pub use conversation_memory::{ConversationMemory, Fusion};
pub use emotion_scorer::{EmotionScorer, ScorerState};
pub use oracle_gateway::OracleGateway;
pub use persona_builder::PersonaBuilder;
pub use simulation_controller::{SimulationController, SimulationControllerBuilder};
pub use turn_drafter::{DraftContext, TurnDrafter};
pub use ui_executor::{apply_actions, UiExecutor};
