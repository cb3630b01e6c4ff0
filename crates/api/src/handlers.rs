//! Route handlers.
//!
//! Endpoints:
//!
//! - `GET    /health`                 — Liveness and credential count
//! - `POST   /session/new`            — Create a chat session
//! - `POST   /chat`                   — Ask a question, get the answer and trace
//! - `POST   /chat/stream`            — Same, delivered as SSE chunks
//! - `GET    /session/{id}/history`   — Ordered messages of a session
//! - `GET    /sessions/{user_id}`     — A user's sessions, newest first
//! - `DELETE /session/{id}`           — Remove a session and its messages
//! - `POST   /transcribe`             — Raw audio body in, text out
//! - `GET    /context/{user_id}`      — The context bundle a query would see

use agrow_core::context::{ContextBundle, ContextRequest};
use agrow_core::error::StorageError;
use agrow_core::message::{Role, Session, StoredMessage};
use agrow_core::provider::AudioInput;
use agrow_reasoning::TraceRecord;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Json,
    response::sse::{Event as SseEvent, Sse},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tracing::{error, info, warn};

use crate::SharedState;

/// What the farmer sees when every backend credential has failed.
pub const RETRY_MESSAGE: &str = "I apologize, but I encountered an error. Please try again.";

/// Routing mode reported when reasoning could not run.
const ERROR_MODE: &str = "ERROR";

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl std::fmt::Display) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn storage_error(e: StorageError) -> ApiError {
    error!(error = %e, "Storage failure");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
}

#[derive(Deserialize)]
pub struct SessionRequest {
    pub user_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    /// Without a user there is no field to fetch context for.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub field_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub message_id: String,
    pub context_used: Vec<String>,
    pub routing_mode: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceRecord>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<StoredMessage>,
}

#[derive(Serialize)]
pub struct SessionListResponse {
    pub user_id: String,
    pub sessions: Vec<Session>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct FieldQuery {
    #[serde(default)]
    pub field_id: Option<String>,
}

#[derive(Deserialize)]
pub struct TranscribeQuery {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

// ── Service ───────────────────────────────────────────────────────────────

pub async fn service_info() -> Json<serde_json::Value> {
    Json(json!({
        "service": "Agrow diagnostic reasoning",
        "version": env!("CARGO_PKG_VERSION"),
        "architecture": "Fast Lane + Deep Dive",
    }))
}

pub async fn health(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "credentials": state.credentials,
    }))
}

// ── Sessions ──────────────────────────────────────────────────────────────

pub async fn create_session(
    State(state): State<SharedState>,
    Json(payload): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let title = payload
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "New Conversation".into());
    info!(user_id = %payload.user_id, "Creating session");

    let session = state
        .store
        .create_session(&payload.user_id, &title)
        .await
        .map_err(storage_error)?;

    Ok(Json(SessionResponse {
        session_id: session.id,
        title: session.title,
        created_at: session.created_at,
    }))
}

pub async fn history(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let messages = state
        .store
        .read_messages(&session_id)
        .await
        .map_err(storage_error)?;
    Ok(Json(HistoryResponse {
        session_id,
        messages,
    }))
}

pub async fn list_sessions(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state
        .store
        .list_sessions(&user_id)
        .await
        .map_err(storage_error)?;
    Ok(Json(SessionListResponse {
        user_id,
        count: sessions.len(),
        sessions,
    }))
}

pub async fn delete_session(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let existed = state
        .store
        .delete_session(&session_id)
        .await
        .map_err(storage_error)?;
    if !existed {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            StorageError::NotFound(session_id),
        ));
    }
    Ok(Json(json!({"status": "deleted", "session_id": session_id})))
}

// ── Chat ──────────────────────────────────────────────────────────────────

/// One completed chat turn, already persisted.
struct Turn {
    response: String,
    message_id: String,
    context_used: Vec<String>,
    routing_mode: String,
    trace: Option<TraceRecord>,
}

/// Fetch the asking user's context. A failed fetch degrades to an empty bundle.
async fn fetch_context(state: &SharedState, request: &ContextRequest) -> ContextBundle {
    if request.user_id.is_none() {
        return ContextBundle::new();
    }
    match state.context.fetch(request).await {
        Ok(bundle) => {
            info!(keys = bundle.len(), source = state.context.name(), "Context fetched");
            bundle
        }
        Err(e) => {
            warn!(
                error = %e,
                source = state.context.name(),
                "Context fetch failed, continuing without field data"
            );
            ContextBundle::new()
        }
    }
}

async fn run_turn(state: &SharedState, payload: &ChatRequest) -> Result<Turn, ApiError> {
    // History is read before this turn's message lands in it.
    let history = state
        .store
        .read_messages(&payload.session_id)
        .await
        .map_err(storage_error)?;

    state
        .store
        .append_message(&payload.session_id, Role::User, &payload.message, false)
        .await
        .map_err(storage_error)?;

    let bundle = fetch_context(
        state,
        &ContextRequest {
            user_id: payload.user_id.clone(),
            field_id: payload.field_id.clone(),
        },
    )
    .await;

    let (response, context_used, routing_mode, trace) = match state
        .orchestrator
        .answer_with_history(&payload.message, &bundle, &history)
        .await
    {
        Ok(answer) => (
            answer.response,
            answer.context_used,
            answer.routing_mode.as_str().to_string(),
            Some(answer.trace),
        ),
        Err(e) => {
            error!(error = %e, session_id = %payload.session_id, "Reasoning failed");
            (RETRY_MESSAGE.to_string(), Vec::new(), ERROR_MODE.to_string(), None)
        }
    };

    let message_id = state
        .store
        .append_message(
            &payload.session_id,
            Role::Assistant,
            &response,
            !bundle.is_empty(),
        )
        .await
        .map_err(storage_error)?;

    Ok(Turn {
        response,
        message_id,
        context_used,
        routing_mode,
        trace,
    })
}

pub async fn chat(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    info!(session_id = %payload.session_id, "Chat request");
    let turn = run_turn(&state, &payload).await?;

    Ok(Json(ChatResponse {
        response: turn.response,
        session_id: payload.session_id,
        message_id: turn.message_id,
        context_used: turn.context_used,
        routing_mode: turn.routing_mode,
        timestamp: Utc::now(),
        trace: turn.trace,
    }))
}

/// Split text into chunks of at most `size` characters.
fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

// ── SSE Streaming ─────────────────────────────────────────────────────────

/// `POST /chat/stream`: a `metadata` event, the answer as `chunk` events,
/// then a `done` event carrying the full text.
pub async fn chat_stream(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    info!(session_id = %payload.session_id, "Chat stream request");
    let turn = run_turn(&state, &payload).await?;

    let mut events = Vec::new();
    events.push(SseEvent::default().event("metadata").data(
        json!({
            "type": "metadata",
            "session_id": payload.session_id,
            "message_id": turn.message_id,
            "routing_mode": turn.routing_mode,
            "context_used": turn.context_used,
        })
        .to_string(),
    ));
    for chunk in chunk_text(&turn.response, state.stream_chunk_chars) {
        events.push(
            SseEvent::default()
                .event("chunk")
                .data(json!({"type": "chunk", "text": chunk}).to_string()),
        );
    }
    events.push(SseEvent::default().event("done").data(
        json!({
            "type": "done",
            "message_id": turn.message_id,
            "full_text": turn.response,
        })
        .to_string(),
    ));

    let stream = futures::stream::iter(events.into_iter().map(Ok::<_, Infallible>));
    Ok(Sse::new(stream))
}

// ── Voice ─────────────────────────────────────────────────────────────────

pub async fn transcribe(
    State(state): State<SharedState>,
    Query(query): Query<TranscribeQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TranscribeResponse>, ApiError> {
    if body.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Empty audio body"));
    }
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let extension = mime_type
        .split('/')
        .nth(1)
        .and_then(|sub| sub.split(';').next())
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin");
    info!(bytes = body.len(), mime = %mime_type, "Transcription request");

    let audio = AudioInput {
        bytes: body.to_vec(),
        file_name: format!("audio.{extension}"),
        mime_type,
        language: query.language,
    };
    let text = state.completer.transcribe(audio).await.map_err(|e| {
        error!(error = %e, "Transcription failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
    })?;

    Ok(Json(TranscribeResponse {
        text: text.trim().to_string(),
    }))
}

// ── Debug ─────────────────────────────────────────────────────────────────

/// The bundle a query from this user would be reasoned over.
pub async fn context_debug(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Query(query): Query<FieldQuery>,
) -> Result<Json<ContextBundle>, ApiError> {
    let request = ContextRequest {
        user_id: Some(user_id),
        field_id: query.field_id,
    };
    let bundle = state
        .context
        .fetch(&request)
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e))?;
    Ok(Json(bundle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApiState, build_router};
    use agrow_core::error::ProviderError;
    use agrow_core::provider::{CompletionRequest, TextCompleter};
    use agrow_core::store::MessageStore;
    use agrow_memory::InMemoryStore;
    use agrow_providers::StaticContextSource;
    use agrow_reasoning::{Orchestrator, ProtocolSet, RoutingPolicy, Synthesizer};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// Replays canned replies in order, then fails as if every credential
    /// were exhausted.
    struct CannedCompleter {
        replies: Mutex<Vec<String>>,
    }

    impl CannedCompleter {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl TextCompleter for CannedCompleter {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
            self.replies.lock().unwrap().pop().ok_or(ProviderError::Exhausted {
                credentials: 1,
                attempts: 3,
                last_error: Box::new(ProviderError::Network("down".into())),
            })
        }

        async fn transcribe(&self, audio: AudioInput) -> Result<String, ProviderError> {
            Ok(format!(" heard {} bytes of {} ", audio.bytes.len(), audio.file_name))
        }
    }

    fn dry_field() -> ContextBundle {
        ContextBundle::from_value(json!({
            "vegetation_indices": {"NDVI": 0.42, "SMI": 0.15},
            "weather": {"rolling_stats": {"total_precip_7d": 2}}
        }))
        .unwrap()
    }

    fn state_with(replies: &[&str], bundle: ContextBundle) -> (SharedState, Arc<InMemoryStore>) {
        let completer: Arc<dyn TextCompleter> = Arc::new(CannedCompleter::new(replies));
        let orchestrator = Orchestrator::new(
            RoutingPolicy::default(),
            ProtocolSet::with_deep_dive(completer.clone(), "adversarial").unwrap(),
            Synthesizer::new(completer.clone()),
        );
        let store = Arc::new(InMemoryStore::new());
        let state = ApiState::new(
            Arc::new(orchestrator),
            store.clone(),
            Arc::new(StaticContextSource::new(bundle)),
            completer,
        )
        .with_credentials(2)
        .with_stream_chunk_chars(5);
        (Arc::new(state), store)
    }

    const FAST_LANE_REPLY: &str =
        r#"{"reasoning_trace": "SMI low", "diagnosis": "Low soil moisture", "confidence": 0.9, "action": "Irrigate"}"#;

    async fn post_json(
        app: axum::Router,
        uri: &str,
        body: serde_json::Value,
    ) -> axum::response::Response {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.oneshot(req).await.unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_credentials() {
        let (state, _) = state_with(&[], ContextBundle::new());
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["credentials"], 2);
    }

    #[tokio::test]
    async fn chat_answers_and_persists_both_turns() {
        let (state, store) = state_with(&[FAST_LANE_REPLY, "Irrigate today."], dry_field());
        let response = post_json(
            build_router(state),
            "/chat",
            json!({"session_id": "s1", "message": "Is my field too dry?", "user_id": "u1"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["response"], "Irrigate today.");
        assert_eq!(body["routing_mode"], "FAST_LANE");
        assert!(
            body["context_used"]
                .as_array()
                .unwrap()
                .contains(&json!("SMI"))
        );
        assert_eq!(body["trace"]["intent_detected"], "water_stress");

        let messages = store.read_messages("s1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert!(!messages[0].context_used);
        assert_eq!(messages[1].id, body["message_id"]);
        assert!(messages[1].context_used);
    }

    #[tokio::test]
    async fn chat_without_user_skips_context() {
        let (state, store) = state_with(&[FAST_LANE_REPLY, "Hard to say."], dry_field());
        let response = post_json(
            build_router(state),
            "/chat",
            json!({"session_id": "s1", "message": "Is my field too dry?"}),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["context_used"], json!([]));
        assert!(!store.read_messages("s1").await.unwrap()[1].context_used);
    }

    #[tokio::test]
    async fn exhaustion_becomes_retry_message() {
        let (state, store) = state_with(&[], dry_field());
        let response = post_json(
            build_router(state),
            "/chat",
            json!({"session_id": "s1", "message": "Is my field too dry?", "user_id": "u1"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["response"], RETRY_MESSAGE);
        assert_eq!(body["routing_mode"], "ERROR");
        assert!(body.get("trace").is_none());
        assert_eq!(store.read_messages("s1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stream_emits_metadata_chunks_done() {
        let (state, _) = state_with(&[FAST_LANE_REPLY, "Irrigate today."], dry_field());
        let response = post_json(
            build_router(state),
            "/chat/stream",
            json!({"session_id": "s1", "message": "Is my field too dry?", "user_id": "u1"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let metadata = text.find("event: metadata").unwrap();
        let done = text.find("event: done").unwrap();
        assert!(metadata < done);
        // "Irrigate today." is 15 chars, three chunks of five.
        assert_eq!(text.matches("event: chunk").count(), 3);
        assert!(text.contains(r#""text":"Irrig""#));
        assert!(text.contains(r#""full_text":"Irrigate today.""#));
        assert!(text.contains("FAST_LANE"));
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let (state, _) = state_with(&[], ContextBundle::new());
        let app = build_router(state);

        let created = body_json(
            post_json(app.clone(), "/session/new", json!({"user_id": "u1"})).await,
        )
        .await;
        assert_eq!(created["title"], "New Conversation");
        let id = created["session_id"].as_str().unwrap().to_string();

        let req = Request::builder().uri("/sessions/u1").body(Body::empty()).unwrap();
        let listed = body_json(app.clone().oneshot(req).await.unwrap()).await;
        assert_eq!(listed["count"], 1);

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/session/{id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/session/{id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_is_ordered() {
        let (state, store) = state_with(&[], ContextBundle::new());
        store.append_message("s9", Role::User, "first", false).await.unwrap();
        store.append_message("s9", Role::Assistant, "second", true).await.unwrap();

        let req = Request::builder()
            .uri("/session/s9/history")
            .body(Body::empty())
            .unwrap();
        let body = body_json(build_router(state).oneshot(req).await.unwrap()).await;
        assert_eq!(body["messages"][0]["content"], "first");
        assert_eq!(body["messages"][1]["role"], "assistant");
    }

    #[tokio::test]
    async fn transcribe_passes_audio_through() {
        let (state, _) = state_with(&[], ContextBundle::new());
        let req = Request::builder()
            .method("POST")
            .uri("/transcribe?language=hi")
            .header("content-type", "audio/webm")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();
        let response = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["text"], "heard 64 bytes of audio.webm");
    }

    #[tokio::test]
    async fn empty_audio_rejected() {
        let (state, _) = state_with(&[], ContextBundle::new());
        let req = Request::builder()
            .method("POST")
            .uri("/transcribe")
            .body(Body::empty())
            .unwrap();
        let response = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn context_debug_returns_bundle() {
        let (state, _) = state_with(&[], dry_field());
        let req = Request::builder()
            .uri("/context/u1?field_id=f1")
            .body(Body::empty())
            .unwrap();
        let body = body_json(build_router(state).oneshot(req).await.unwrap()).await;
        assert_eq!(body["vegetation_indices"]["SMI"], 0.15);
    }

    #[test]
    fn chunks_split_on_characters() {
        assert_eq!(chunk_text("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(chunk_text("खेत सूखा", 2).len(), 4);
        assert!(chunk_text("", 15).is_empty());
    }
}
