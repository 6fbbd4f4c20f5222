//! Agent-under-test adapters.

pub mod http;

pub use http::HttpAgentClient;
