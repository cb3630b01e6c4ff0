//! Chat persistence for Agrow.
//!
//! Two [`agrow_core::MessageStore`] implementations: an in-process store for
//! tests and ephemeral runs, and a SQLite store for deployments.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
