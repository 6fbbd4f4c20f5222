//! Adapters for the oracle, the agent under test, session storage and
//! event transport, plus scripted doubles of the first two.

pub mod agent;
pub mod events;
pub mod oracle;
pub mod scripted;
pub mod store;
