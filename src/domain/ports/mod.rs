//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces the simulation core consumes:
//! - Oracle: language-model generation and judging capability
//! - AgentUnderTest: the recommendation agent being exercised
//! - EventSink: fire-and-forget event logging
//! - SessionStore: storage for run sessions and their artifacts

pub mod agent;
pub mod event_sink;
pub mod oracle;
pub mod session_store;

pub use agent::{AgentError, AgentRequest, AgentResponse, AgentUnderTest, Product};
pub use event_sink::{event_types, EventSink};
pub use oracle::{Oracle, OracleError, OraclePurpose, OracleRequest, OracleResponse};
pub use session_store::SessionStore;
