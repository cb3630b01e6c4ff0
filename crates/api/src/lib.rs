//! HTTP front door for Agrow.
//!
//! A thin layer over the [`Orchestrator`]: it persists chat turns, fetches the
//! field context for the asking user, and turns backend exhaustion into a
//! polite retry message instead of an error page.
//!
//! Built on Axum.

pub mod handlers;

use agrow_config::{AppConfig, StorageConfig};
use agrow_core::context::ContextSource;
use agrow_core::error::StorageError;
use agrow_core::provider::TextCompleter;
use agrow_core::store::MessageStore;
use agrow_memory::{InMemoryStore, SqliteStore};
use agrow_reasoning::Orchestrator;
use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Audio uploads are the largest bodies we accept.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state for the front door.
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn MessageStore>,
    pub context: Arc<dyn ContextSource>,
    /// Used directly for transcription
    pub completer: Arc<dyn TextCompleter>,
    /// Size of the credential pool, reported by `/health`
    pub credentials: usize,
    pub stream_chunk_chars: usize,
}

impl ApiState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn MessageStore>,
        context: Arc<dyn ContextSource>,
        completer: Arc<dyn TextCompleter>,
    ) -> Self {
        Self {
            orchestrator,
            store,
            context,
            completer,
            credentials: 0,
            stream_chunk_chars: 15,
        }
    }

    pub fn with_credentials(mut self, credentials: usize) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_stream_chunk_chars(mut self, chars: usize) -> Self {
        self.stream_chunk_chars = chars.max(1);
        self
    }
}

pub type SharedState = Arc<ApiState>;

/// Build the Axum router with every route.
///
/// Layers, outermost first: HTTP trace logging, permissive CORS, and a body
/// limit sized for audio uploads.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health))
        .route("/session/new", post(handlers::create_session))
        .route("/session/{id}/history", get(handlers::history))
        .route("/session/{id}", delete(handlers::delete_session))
        .route("/sessions/{user_id}", get(handlers::list_sessions))
        .route("/chat", post(handlers::chat))
        .route("/chat/stream", post(handlers::chat_stream))
        .route("/transcribe", post(handlers::transcribe))
        .route("/context/{user_id}", get(handlers::context_debug))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Open the message store named in the configuration.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn MessageStore>, StorageError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "sqlite" => {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
            let store = SqliteStore::new(&format!("sqlite://{}", config.path)).await?;
            Ok(Arc::new(store))
        }
        other => Err(StorageError::Storage(format!(
            "Unknown storage backend '{other}' (expected 'sqlite' or 'memory')"
        ))),
    }
}

/// Start the HTTP server.
///
/// Builds the gateway, orchestrator, store and context source once and
/// shares them through [`ApiState`].
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let gateway = Arc::new(agrow_providers::build_gateway(&config));
    let credentials = gateway.credentials();
    let completer: Arc<dyn TextCompleter> = gateway;

    let orchestrator = Arc::new(Orchestrator::from_config(&config, completer.clone())?);
    let store = open_store(&config.storage).await?;
    let context = agrow_providers::build_context_source(&config);

    info!(
        store = store.name(),
        context = context.name(),
        protocol = %config.routing.deep_dive_protocol,
        "Front door components ready"
    );

    let state = Arc::new(
        ApiState::new(orchestrator, store, context, completer)
            .with_credentials(credentials)
            .with_stream_chunk_chars(config.gateway.stream_chunk_chars),
    );
    let app = build_router(state);

    info!(addr = %addr, "Agrow API starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_opens() {
        let config = StorageConfig {
            backend: "memory".into(),
            ..StorageConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "in_memory");
    }

    #[tokio::test]
    async fn sqlite_backend_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("agrow-api-{}", std::process::id()));
        let config = StorageConfig {
            backend: "sqlite".into(),
            path: dir.join("nested").join("agrow.db").to_string_lossy().into_owned(),
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn unknown_backend_rejected() {
        let config = StorageConfig {
            backend: "postgres".into(),
            ..StorageConfig::default()
        };
        assert!(open_store(&config).await.is_err());
    }
}
