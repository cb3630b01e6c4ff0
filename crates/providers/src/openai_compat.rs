//! OpenAI-compatible completion backend.
//!
//! Works with Groq, OpenAI, OpenRouter, vLLM, Ollama and any endpoint that
//! exposes `/chat/completions` and `/audio/transcriptions`.
//!
//! The backend performs exactly one HTTP call per method invocation and maps
//! status codes onto [`ProviderError`]. Retrying and credential rotation are
//! the gateway's job.

use agrow_core::error::ProviderError;
use agrow_core::provider::{AudioInput, CompletionBackend, CompletionRequest, Credential};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible text-completion backend.
pub struct OpenAiCompatBackend {
    name: String,
    base_url: String,
    model: String,
    transcription_model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    /// Create a backend for the given base URL (e.g. `https://api.groq.com/openai/v1`).
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: "llama-3.3-70b-versatile".into(),
            transcription_model: "whisper-large-v3".into(),
            temperature: 0.7,
            max_tokens: 2048,
            client: reqwest::Client::new(),
        }
    }

    /// Create a Groq backend (convenience constructor).
    pub fn groq() -> Self {
        Self::new("groq", "https://api.groq.com/openai/v1")
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build the JSON body for a chat completion.
    fn chat_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ApiMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ApiMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        serde_json::json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": messages,
            "temperature": request.temperature.unwrap_or(self.temperature),
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
            "stream": false,
        })
    }

    /// Map a non-success HTTP response onto a provider error.
    async fn error_from(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(5);
            return ProviderError::RateLimited { retry_after_secs };
        }

        if status == 401 || status == 403 {
            return ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            );
        }

        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Backend returned error");
        ProviderError::ApiError {
            status_code: status,
            message: error_body,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.chat_body(request);

        debug!(
            backend = %self.name,
            model = request.model.as_deref().unwrap_or(&self.model),
            prompt_chars = request.prompt.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })
    }

    async fn transcribe(
        &self,
        credential: &Credential,
        audio: &AudioInput,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file = reqwest::multipart::Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.mime_type)
            .map_err(|e| ProviderError::ApiError {
                status_code: 400,
                message: format!("Invalid audio mime type '{}': {e}", audio.mime_type),
            })?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.transcription_model.clone())
            .text("response_format", "json");
        if let Some(language) = &audio.language {
            form = form.text("language", language.clone());
        }

        debug!(
            backend = %self.name,
            model = %self.transcription_model,
            bytes = audio.bytes.len(),
            "Sending transcription request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.expose())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let transcript: TranscriptionResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse transcription: {e}"),
            })?;

        Ok(transcript.text.trim().to_string())
    }
}

// --- OpenAI API types ---

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}
