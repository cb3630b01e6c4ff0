//! Error types for the Agrow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Agrow operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion backend errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Persistence errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Context aggregator errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("All {credentials} credentials failed after {attempts} attempts. Last error: {last_error}")]
    Exhausted {
        credentials: usize,
        attempts: usize,
        last_error: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Whether this failure is the backend asking us to slow down.
    ///
    /// Some backends report throttling as a generic error whose body names a
    /// `rate_limit` code instead of answering 429, so both shapes count.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::ApiError { status_code, message } => {
                *status_code == 429 || message.to_ascii_lowercase().contains("rate_limit")
            }
            _ => false,
        }
    }

    /// The underlying cause when this is an aggregated exhaustion error.
    pub fn last_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Session not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Context aggregator unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid context payload: {0}")]
    InvalidPayload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 500,
            message: "upstream exploded".into(),
        });
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[test]
    fn rate_limit_signal_is_distinguishable() {
        assert!(ProviderError::RateLimited { retry_after_secs: 5 }.is_rate_limit());
        assert!(
            ProviderError::ApiError {
                status_code: 400,
                message: "{\"error\":{\"code\":\"rate_limit_exceeded\"}}".into(),
            }
            .is_rate_limit()
        );
        assert!(!ProviderError::Timeout("slow".into()).is_rate_limit());
        assert!(!ProviderError::Network("reset".into()).is_rate_limit());
    }

    #[test]
    fn exhausted_error_references_last_error() {
        let err = ProviderError::Exhausted {
            credentials: 3,
            attempts: 9,
            last_error: Box::new(ProviderError::Network("connection reset".into())),
        };
        let text = err.to_string();
        assert!(text.contains("All 3 credentials failed"));
        assert!(text.contains("connection reset"));
        assert!(matches!(err.last_error(), Some(ProviderError::Network(_))));
    }
}
