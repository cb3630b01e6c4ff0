//! Completion seams: the abstraction over text-completion backends.
//!
//! Two layers:
//! - [`CompletionBackend`] performs one raw call with one credential and knows
//!   nothing about retries.
//! - [`TextCompleter`] is the resilient surface the pipeline uses. The
//!   credential-rotating gateway implements it on top of a backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// An opaque API credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for building an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// One chat-style completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The user-turn prompt
    pub prompt: String,

    /// Optional system message sent before the prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Model override; the gateway fills in its default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Temperature override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// An audio clip to transcribe.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    /// Optional ISO-639-1 language hint
    pub language: Option<String>,
}

impl AudioInput {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// A single text-completion service reachable with one of several credentials.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "groq").
    fn name(&self) -> &str;

    /// Run one chat completion with the given credential.
    async fn complete(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> std::result::Result<String, ProviderError>;

    /// Transcribe one audio clip with the given credential.
    ///
    /// Default implementation reports that transcription isn't supported.
    async fn transcribe(
        &self,
        _credential: &Credential,
        _audio: &AudioInput,
    ) -> std::result::Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "Backend '{}' does not support transcription",
            self.name()
        )))
    }
}

/// The resilient completion surface consumed by the reasoning pipeline.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    /// Complete a prompt, returning the raw text of the reply.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<String, ProviderError>;

    /// Transcribe audio to text.
    async fn transcribe(&self, _audio: AudioInput) -> std::result::Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Transcription is not available".into(),
        ))
    }
}
