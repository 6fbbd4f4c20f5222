//! Common test utilities for integration tests
//!
//! Shared fixtures for building controllers around the scripted doubles.

#![allow(dead_code)]

use std::sync::Arc;

use mimic::adapters::events::RecordingEventSink;
use mimic::adapters::scripted::{ScriptedAgent, ScriptedOracle};
use mimic::domain::models::{Config, Thresholds};
use mimic::services::SimulationController;

/// Config with fixed thresholds so runs do not depend on persona wording.
pub fn test_config(max_steps: u32) -> Config {
    let mut config = Config::default();
    config.simulation.max_steps = max_steps;
    config.emotion.gamma = 0.9;
    config.emotion.thresholds = Some(Thresholds::new(0.6, 1.2));
    config.oracle.timeout_secs = 5;
    config.agent.timeout_secs = 5;
    config
}

pub struct Harness {
    pub controller: SimulationController,
    pub oracle: Arc<ScriptedOracle>,
    pub agent: Arc<ScriptedAgent>,
    pub events: Arc<RecordingEventSink>,
}

pub fn harness(oracle: ScriptedOracle, agent: ScriptedAgent, config: Config) -> Harness {
    let oracle = Arc::new(oracle);
    let agent = Arc::new(agent);
    let events = Arc::new(RecordingEventSink::new());
    let controller = SimulationController::builder()
        .oracle(oracle.clone())
        .agent(agent.clone())
        .event_sink(events.clone())
        .config(config)
        .build()
        .expect("controller should build");
    Harness {
        controller,
        oracle,
        agent,
        events,
    }
}

/// Setup test logging
///
/// Call at the beginning of tests that need log output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
