//! SQLite message store.
//!
//! Uses a single SQLite database file with two tables:
//! - `sessions` — one row per chat session
//! - `messages` — chat turns, keyed by session
//!
//! Timestamps are stored as fixed-width RFC 3339 text so they sort
//! lexically. The integer `seq` column breaks ties in insertion order.

use agrow_core::error::StorageError;
use agrow_core::message::{Role, Session, StoredMessage};
use agrow_core::store::MessageStore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A SQLite-backed chat store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to an in-memory database sees its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite message store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT UNIQUE NOT NULL,
                user_id      TEXT NOT NULL,
                title        TEXT NOT NULL,
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT UNIQUE NOT NULL,
                session_id   TEXT NOT NULL,
                role         TEXT NOT NULL,
                content      TEXT NOT NULL,
                context_used INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("sessions index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StorageError> {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StorageError::QueryFailed(format!("bad timestamp '{text}': {e}")))
    }

    fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StorageError>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| StorageError::QueryFailed(format!("{name} column: {e}")))
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StorageError> {
        let created_at: String = Self::column(row, "created_at")?;
        Ok(Session {
            id: Self::column(row, "id")?,
            user_id: Self::column(row, "user_id")?,
            title: Self::column(row, "title")?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, StorageError> {
        let role: String = Self::column(row, "role")?;
        let created_at: String = Self::column(row, "created_at")?;
        Ok(StoredMessage {
            id: Self::column(row, "id")?,
            session_id: Self::column(row, "session_id")?,
            role: role.parse::<Role>().map_err(StorageError::QueryFailed)?,
            content: Self::column(row, "content")?,
            context_used: Self::column(row, "context_used")?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_session(&self, user_id: &str, title: &str) -> Result<Session, StorageError> {
        let session = Session::new(user_id, title);
        sqlx::query("INSERT INTO sessions (id, user_id, title, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&session.id)
            .bind(&session.user_id)
            .bind(&session.title)
            .bind(Self::timestamp(session.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Storage(format!("INSERT session failed: {e}")))?;

        debug!(session_id = %session.id, "Created session");
        Ok(session)
    }

    async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
        context_used: bool,
    ) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO messages (id, session_id, role, content, context_used, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(session_id)
        .bind(role.as_str())
        .bind(text)
        .bind(context_used)
        .bind(Self::timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Storage(format!("INSERT message failed: {e}")))?;

        debug!(session_id, message_id = %id, role = %role, "Appended message");
        Ok(id)
    }

    async fn read_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE session_id = ?1 ORDER BY created_at ASC, seq ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("read messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM sessions WHERE user_id = ?1 ORDER BY created_at DESC, seq DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("list sessions: {e}")))?;

        rows.iter().map(Self::row_to_session).collect()
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Storage(format!("begin: {e}")))?;

        sqlx::query("DELETE FROM messages WHERE session_id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Storage(format!("DELETE messages failed: {e}")))?;

        let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Storage(format!("DELETE session failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Storage(format!("commit: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
