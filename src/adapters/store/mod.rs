//! Session store adapters.

pub mod memory;
pub mod sqlite;

pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;
