//! # Agrow Core
//!
//! Domain types, traits, and error definitions for the Agrow diagnostic
//! reasoning orchestrator. This crate has **no framework dependencies**: it
//! defines the seams every other crate implements against.
//!
//! ## Seams
//!
//! - [`CompletionBackend`]: one raw call to a text-completion service with a
//!   given credential. Implemented over HTTP in `agrow-providers`.
//! - [`TextCompleter`]: what the reasoning pipeline talks to. The credential
//!   rotating gateway implements it, and so do test doubles.
//! - [`ContextSource`]: the upstream context aggregator.
//! - [`MessageStore`]: chat persistence.

pub mod context;
pub mod error;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use context::{ContextBundle, ContextRequest, ContextSource};
pub use error::{ContextError, Error, ProviderError, Result, StorageError};
pub use message::{Role, Session, StoredMessage};
pub use provider::{AudioInput, CompletionBackend, CompletionRequest, Credential, TextCompleter};
pub use store::MessageStore;
