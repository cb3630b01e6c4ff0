//! Completion backends, credential rotation, and context aggregator clients.
//!
//! Every model call in Agrow goes through a [`CompletionGateway`], which
//! rotates over a [`KeyPool`] and delegates the actual HTTP exchange to a
//! [`agrow_core::CompletionBackend`] such as [`OpenAiCompatBackend`].

pub mod aggregator;
pub mod gateway;
pub mod key_pool;
pub mod openai_compat;
pub mod sanitize;

pub use aggregator::{HttpContextSource, StaticContextSource};
pub use gateway::{CompletionGateway, GatewaySnapshot};
pub use key_pool::KeyPool;
pub use openai_compat::OpenAiCompatBackend;

use agrow_config::AppConfig;
use agrow_core::context::ContextSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the completion gateway described by the configuration.
pub fn build_gateway(config: &AppConfig) -> CompletionGateway {
    let backend = OpenAiCompatBackend::new("groq", config.api_url.clone())
        .with_model(config.model.clone())
        .with_transcription_model(config.transcription_model.clone())
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);

    let pool = KeyPool::from_secrets(&config.api_keys);
    if pool.is_empty() {
        warn!("No API keys configured; every model call will fail until AGROW_API_KEYS is set");
    } else {
        info!(credentials = pool.len(), url = %config.api_url, "Completion gateway ready");
    }

    CompletionGateway::new(Arc::new(backend), pool)
        .with_max_attempts(config.retry.max_attempts_per_credential)
        .with_base_backoff(Duration::from_millis(config.retry.base_backoff_ms))
        .with_timeout(Duration::from_secs(config.retry.request_timeout_secs))
}

/// Build the context source described by the configuration.
///
/// Without an aggregator URL every query runs on an empty bundle.
pub fn build_context_source(config: &AppConfig) -> Arc<dyn ContextSource> {
    match &config.aggregator.url {
        Some(url) => Arc::new(
            HttpContextSource::new(url.clone())
                .with_timeout(Duration::from_secs(config.aggregator.timeout_secs)),
        ),
        None => {
            warn!("No aggregator URL configured; queries will run without field context");
            Arc::new(StaticContextSource::empty())
        }
    }
}
