//! Configuration loading, validation, and management for Agrow.
//!
//! Loads configuration from `~/.agrow/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.agrow/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Credential pool for the completion backend, rotated round-robin
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<String>,

    /// Base URL of the OpenAI-compatible completion API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Chat model used for every reasoning stage
    #[serde(default = "default_model")]
    pub model: String,

    /// Speech-to-text model
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    /// Sampling temperature for reasoning stages
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reasoning stage reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Retry and timeout policy for backend calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Fast Lane / Deep Dive routing
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Final answer generation
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// HTTP front door
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Chat persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Upstream context aggregator
    #[serde(default)]
    pub aggregator: AggregatorConfig,
}

fn default_api_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".into()
}
fn default_transcription_model() -> String {
    "whisper-large-v3".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_keys", &format_args!("[{} REDACTED]", self.api_keys.len()))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("transcription_model", &self.transcription_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .field("routing", &self.routing)
            .field("synthesis", &self.synthesis)
            .field("gateway", &self.gateway)
            .field("storage", &self.storage)
            .field("aggregator", &self.aggregator)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts on one credential before rotating to the next
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_credential: u32,

    /// First backoff delay; doubles on each further attempt
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Upper bound on a single backend call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_backoff_ms() -> u64 {
    1000
}
fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_credential: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Deep Dive variants selectable in config.
pub const DEEP_DIVE_PROTOCOLS: &[&str] = &["adversarial", "staged"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Confidence the primary intent must exceed to take the Fast Lane
    #[serde(default = "default_fast_lane_threshold")]
    pub fast_lane_threshold: f64,

    /// Intents simple enough for a single-call diagnosis
    #[serde(default = "default_simple_intents")]
    pub simple_intents: Vec<String>,

    /// "adversarial" (hypothesis → adversary → judge) or
    /// "staged" (claim → validate → contradict → confirm)
    #[serde(default = "default_deep_dive_protocol")]
    pub deep_dive_protocol: String,
}

fn default_fast_lane_threshold() -> f64 {
    0.7
}
fn default_simple_intents() -> Vec<String> {
    vec![
        "vegetation_health".into(),
        "water_stress".into(),
        "nutrient_status".into(),
    ]
}
fn default_deep_dive_protocol() -> String {
    "adversarial".into()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            fast_lane_threshold: default_fast_lane_threshold(),
            simple_intents: default_simple_intents(),
            deep_dive_protocol: default_deep_dive_protocol(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Token cap for the full five-section answer
    #[serde(default = "default_synthesis_max_tokens")]
    pub max_tokens: u32,

    /// Token cap for the short Fast Lane answer
    #[serde(default = "default_compact_max_tokens")]
    pub compact_max_tokens: u32,
}

fn default_synthesis_max_tokens() -> u32 {
    1500
}
fn default_compact_max_tokens() -> u32 {
    300
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_synthesis_max_tokens(),
            compact_max_tokens: default_compact_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Characters per SSE chunk on the streaming chat endpoint
    #[serde(default = "default_stream_chunk_chars")]
    pub stream_chunk_chars: usize,
}

fn default_port() -> u16 {
    7860
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_stream_chunk_chars() -> usize {
    15
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            stream_chunk_chars: default_stream_chunk_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// SQLite database path
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_backend() -> String {
    "sqlite".into()
}
fn default_storage_path() -> String {
    AppConfig::config_dir()
        .join("agrow.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Context aggregator endpoint; when unset every query runs on an empty bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_aggregator_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_aggregator_timeout_secs() -> u64 {
    45
}

impl AppConfig {
    /// Load configuration from the default path with env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Keys: `AGROW_API_KEYS` (comma separated, falling back to
    /// `GROQ_API_KEYS` then a single `GROQ_API_KEY`), `AGROW_MODEL`,
    /// `AGROW_API_URL`, `AGROW_AGGREGATOR_URL`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let keys = lookup("AGROW_API_KEYS")
            .or_else(|| lookup("GROQ_API_KEYS"))
            .or_else(|| lookup("GROQ_API_KEY"))
            .map(|raw| parse_key_list(&raw))
            .unwrap_or_default();
        if !keys.is_empty() {
            self.api_keys = keys;
        }

        if let Some(model) = lookup("AGROW_MODEL") {
            self.model = model;
        }

        if let Some(url) = lookup("AGROW_API_URL") {
            self.api_url = url;
        }

        if let Some(url) = lookup("AGROW_AGGREGATOR_URL") {
            self.aggregator.url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agrow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.routing.fast_lane_threshold) {
            return Err(ConfigError::ValidationError(
                "routing.fast_lane_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if !DEEP_DIVE_PROTOCOLS.contains(&self.routing.deep_dive_protocol.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "routing.deep_dive_protocol must be one of {DEEP_DIVE_PROTOCOLS:?}, got '{}'",
                self.routing.deep_dive_protocol
            )));
        }

        if self.retry.max_attempts_per_credential == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts_per_credential must be at least 1".into(),
            ));
        }

        if self.gateway.stream_chunk_chars == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.stream_chunk_chars must be at least 1".into(),
            ));
        }

        if !matches!(self.storage.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be 'sqlite' or 'memory', got '{}'",
                self.storage.backend
            )));
        }

        Ok(())
    }

    /// Check if at least one credential is configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_keys.is_empty()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            api_url: default_api_url(),
            model: default_model(),
            transcription_model: default_transcription_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            retry: RetryConfig::default(),
            routing: RoutingConfig::default(),
            synthesis: SynthesisConfig::default(),
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
            aggregator: AggregatorConfig {
                url: None,
                timeout_secs: default_aggregator_timeout_secs(),
            },
        }
    }
}

/// Split a comma separated credential list, dropping blanks.
fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
