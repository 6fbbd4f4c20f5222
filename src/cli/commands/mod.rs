//! CLI command implementations.

pub mod batch;
pub mod config;
pub mod run;
pub mod sessions;
