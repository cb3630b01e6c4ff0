//! Persistence seam for chat sessions and messages.
//!
//! The orchestrator only needs append and ordered read; the front door also
//! creates, lists and deletes sessions.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::message::{Role, Session, StoredMessage};

/// The chat persistence layer.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Create a new session for a user.
    async fn create_session(&self, user_id: &str, title: &str) -> Result<Session, StorageError>;

    /// Append a message and return its id.
    async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
        context_used: bool,
    ) -> Result<String, StorageError>;

    /// All messages of a session ordered by creation time.
    async fn read_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, StorageError>;

    /// A user's sessions, newest first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StorageError>;

    /// Delete a session and its messages. Returns whether it existed.
    async fn delete_session(&self, session_id: &str) -> Result<bool, StorageError>;
}
