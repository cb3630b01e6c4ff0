//! Context aggregator clients.
//!
//! The aggregator is an external service that assembles per-field signals
//! (indices, weather, clustering, profile) into one JSON object. The
//! orchestrator only ever sees the resulting [`ContextBundle`].

use agrow_core::context::{ContextBundle, ContextRequest, ContextSource};
use agrow_core::error::ContextError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Fetches bundles from an HTTP aggregator: `GET {url}?user_id=..&field_id=..`.
pub struct HttpContextSource {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpContextSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(45),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn query_pairs(request: &ContextRequest) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(user_id) = &request.user_id {
            pairs.push(("user_id", user_id.clone()));
        }
        if let Some(field_id) = &request.field_id {
            pairs.push(("field_id", field_id.clone()));
        }
        pairs
    }
}

#[async_trait]
impl ContextSource for HttpContextSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, request: &ContextRequest) -> Result<ContextBundle, ContextError> {
        debug!(url = %self.url, user_id = ?request.user_id, "Fetching field context");

        let response = self
            .client
            .get(&self.url)
            .query(&Self::query_pairs(request))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ContextError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!(status, url = %self.url, "Aggregator returned error");
            return Err(ContextError::Unavailable(format!(
                "aggregator returned HTTP {status}"
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ContextError::InvalidPayload(e.to_string()))?;

        ContextBundle::from_value(value)
    }
}

/// Returns the same bundle for every request. Used when no aggregator is
/// configured, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticContextSource {
    bundle: ContextBundle,
}

impl StaticContextSource {
    pub fn new(bundle: ContextBundle) -> Self {
        Self { bundle }
    }

    /// A source that always yields an empty bundle.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextSource for StaticContextSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, _request: &ContextRequest) -> Result<ContextBundle, ContextError> {
        Ok(self.bundle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_pairs_skip_missing_ids() {
        let request = ContextRequest {
            user_id: Some("farmer-7".into()),
            field_id: None,
        };
        let pairs = HttpContextSource::query_pairs(&request);
        assert_eq!(pairs, vec![("user_id", "farmer-7".to_string())]);
    }

    #[tokio::test]
    async fn static_source_returns_its_bundle() {
        let bundle = ContextBundle::new().with("SMI", json!(0.15));
        let source = StaticContextSource::new(bundle);
        let fetched = source.fetch(&ContextRequest::default()).await.unwrap();
        assert_eq!(fetched.number("SMI"), Some(0.15));
        assert_eq!(source.name(), "static");
    }

    #[tokio::test]
    async fn empty_source_yields_empty_bundle() {
        let fetched = StaticContextSource::empty()
            .fetch(&ContextRequest::default())
            .await
            .unwrap();
        assert!(fetched.is_empty());
    }
}
