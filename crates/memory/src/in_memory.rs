//! In-memory store — useful for testing and ephemeral sessions.

use agrow_core::error::StorageError;
use agrow_core::message::{Role, Session, StoredMessage};
use agrow_core::store::MessageStore;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    sessions: Vec<Session>,
    messages: Vec<StoredMessage>,
}

/// A store that keeps sessions and messages in process memory.
/// Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_session(&self, user_id: &str, title: &str) -> Result<Session, StorageError> {
        let session = Session::new(user_id, title);
        self.tables.write().await.sessions.push(session.clone());
        Ok(session)
    }

    async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
        context_used: bool,
    ) -> Result<String, StorageError> {
        let message = StoredMessage::new(session_id, role, text, context_used);
        let id = message.id.clone();
        self.tables.write().await.messages.push(message);
        Ok(id)
    }

    async fn read_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, StorageError> {
        let tables = self.tables.read().await;
        let mut messages: Vec<StoredMessage> = tables
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StorageError> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> = tables
            .sessions
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.id != session_id);
        tables.messages.retain(|m| m.session_id != session_id);
        Ok(tables.sessions.len() < before)
    }
}
