//! Mimic - persona-driven shopper simulations
//!
//! Mimic exercises a conversational recommendation agent with synthetic
//! shoppers. Each run expands a short persona seed into a profile, then
//! drives a turn loop: draft a user message, have it judged for
//! persona alignment, apply the user's UI actions, call the agent, fuse the
//! exchange into a rolling summary, and score the persona's emotional
//! reaction until a threshold, the step cap, a user stop or an agent
//! failure ends the run.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, port traits and errors
//! - **Service Layer** (`services`): the simulation core
//! - **Adapters** (`adapters`): oracle and agent HTTP clients, session
//!   stores, event sinks, scripted test doubles
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mimic::adapters::scripted::{ScriptedAgent, ScriptedOracle};
//! use mimic::services::SimulationController;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), mimic::SimulationError> {
//! let controller = SimulationController::builder()
//!     .oracle(Arc::new(ScriptedOracle::new()))
//!     .agent(Arc::new(ScriptedAgent::suv_dealer()))
//!     .build()?;
//! let artifact = controller
//!     .run("first-time buyer, $30k budget, Denver", &CancellationToken::new())
//!     .await?;
//! println!("{}", artifact.stop_reason);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{SimulationError, SimulationResult};
pub use domain::models::{
    Action, Config, PersonaProfile, RunArtifact, StopReason, Thresholds, TurnRecord, UiState,
};
pub use domain::ports::{AgentUnderTest, EventSink, Oracle, SessionStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BatchRunner, SimulationController};
