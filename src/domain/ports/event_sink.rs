//! Event sink port.
//!
//! Fire-and-forget: `log` returns nothing, and implementations must swallow
//! their own failures so that event transport can never abort a run.

/// Destination for simulation lifecycle events.
pub trait EventSink: Send + Sync {
    fn log(&self, event_type: &str, payload: serde_json::Value);
}

/// Event names emitted by the controller.
pub mod event_types {
    pub const RUN_STARTED: &str = "run_started";
    pub const PERSONA_BUILT: &str = "persona_built";
    pub const TURN_COMPLETED: &str = "turn_completed";
    pub const RUN_FINISHED: &str = "run_finished";
}
