//! Oracle adapters.

pub mod anthropic;

pub use anthropic::{AnthropicOracle, RetryPolicy};
