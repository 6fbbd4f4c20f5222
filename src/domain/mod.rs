//! Domain layer for the mimic simulation harness
//!
//! This module contains core models, port traits and errors.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{SimulationError, SimulationResult};
