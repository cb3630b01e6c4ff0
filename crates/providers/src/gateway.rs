//! Completion gateway: credential rotation, retry with backoff, and timeouts
//! in front of a single [`CompletionBackend`].
//!
//! Per call the gateway walks the pool once, starting at the shared cursor:
//! - a generic failure (network, timeout, API error) is retried on the same
//!   credential with exponential backoff until its attempt budget runs out;
//! - a rate-limit signal or an authentication failure rotates to the next
//!   credential immediately, without sleeping;
//! - the first success moves the cursor past the working credential.
//!
//! Only when every credential has failed does the caller see an error, a
//! single [`ProviderError::Exhausted`] carrying the last underlying failure.

use agrow_core::error::ProviderError;
use agrow_core::provider::{
    AudioInput, CompletionBackend, CompletionRequest, Credential, TextCompleter,
};
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::key_pool::KeyPool;

/// A resilient [`TextCompleter`] over a rotating credential pool.
pub struct CompletionGateway {
    backend: Arc<dyn CompletionBackend>,
    pool: KeyPool,
    max_attempts: u32,
    base_backoff: Duration,
    timeout: Duration,
    stats: GatewayStats,
}

/// Running counters, for observability and tests.
#[derive(Debug, Default)]
struct GatewayStats {
    attempts: AtomicUsize,
    backoff_sleeps: AtomicUsize,
    rate_limit_skips: AtomicUsize,
}

/// A point-in-time copy of the gateway counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewaySnapshot {
    pub attempts: usize,
    pub backoff_sleeps: usize,
    pub rate_limit_skips: usize,
}

impl CompletionGateway {
    /// Create a gateway with the default policy: 3 attempts per credential,
    /// 1s base backoff, 60s per-call timeout.
    pub fn new(backend: Arc<dyn CompletionBackend>, pool: KeyPool) -> Self {
        Self {
            backend,
            pool,
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
            stats: GatewayStats::default(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of credentials in the pool.
    pub fn credentials(&self) -> usize {
        self.pool.len()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn stats(&self) -> GatewaySnapshot {
        GatewaySnapshot {
            attempts: self.stats.attempts.load(Ordering::Relaxed),
            backoff_sleeps: self.stats.backoff_sleeps.load(Ordering::Relaxed),
            rate_limit_skips: self.stats.rate_limit_skips.load(Ordering::Relaxed),
        }
    }

    /// Delay before retry number `attempt + 1`: `base * 2^(attempt - 1)`.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(factor)
    }

    async fn rotate<F, Fut>(
        &self,
        operation: &'static str,
        call: F,
    ) -> Result<String, ProviderError>
    where
        F: Fn(Credential) -> Fut,
        Fut: Future<Output = Result<String, ProviderError>>,
    {
        let order = self.pool.rotation();
        if order.is_empty() {
            return Err(ProviderError::NotConfigured(
                "No API credentials configured".into(),
            ));
        }

        let total = order.len();
        let mut attempts = 0usize;
        let mut last_error: Option<ProviderError> = None;

        for (index, credential) in order {
            for attempt in 1..=self.max_attempts {
                attempts += 1;
                self.stats.attempts.fetch_add(1, Ordering::Relaxed);
                debug!(operation, credential = index, attempt, "Gateway: calling backend");

                let pending = call(credential.clone());
                let outcome = match tokio::time::timeout(self.timeout, pending).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(format!(
                        "{operation} timed out after {}s",
                        self.timeout.as_secs()
                    ))),
                };

                match outcome {
                    Ok(text) => {
                        self.pool.mark_success(index);
                        if attempts > 1 {
                            info!(
                                operation,
                                credential = index,
                                attempts,
                                "Gateway: recovered after failures"
                            );
                        }
                        return Ok(text);
                    }
                    Err(e) if e.is_rate_limit() => {
                        warn!(
                            operation,
                            credential = index,
                            "Gateway: rate limited, rotating to next credential"
                        );
                        self.stats.rate_limit_skips.fetch_add(1, Ordering::Relaxed);
                        self.pool.mark_exhausted(index);
                        last_error = Some(e);
                        break;
                    }
                    Err(e @ ProviderError::AuthenticationFailed(_)) => {
                        warn!(
                            operation,
                            credential = index,
                            error = %e,
                            "Gateway: credential rejected, rotating"
                        );
                        self.pool.mark_exhausted(index);
                        last_error = Some(e);
                        break;
                    }
                    Err(e) => {
                        warn!(
                            operation,
                            credential = index,
                            attempt,
                            max_attempts = self.max_attempts,
                            error = %e,
                            "Gateway: backend call failed"
                        );
                        last_error = Some(e);

                        if attempt < self.max_attempts {
                            let delay = self.backoff_for(attempt);
                            self.stats.backoff_sleeps.fetch_add(1, Ordering::Relaxed);
                            tokio::time::sleep(delay).await;
                        } else {
                            self.pool.mark_exhausted(index);
                        }
                    }
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| {
            ProviderError::NotConfigured("No attempts were made".into())
        });
        warn!(
            operation,
            credentials = total,
            attempts,
            error = %last_error,
            "Gateway: credential pool exhausted"
        );

        Err(ProviderError::Exhausted {
            credentials: total,
            attempts,
            last_error: Box::new(last_error),
        })
    }
}

#[async_trait]
impl TextCompleter for CompletionGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let backend = self.backend.clone();
        self.rotate("complete", move |credential| {
            let backend = backend.clone();
            let request = request.clone();
            async move { backend.complete(&credential, &request).await }
        })
        .await
    }

    async fn transcribe(&self, audio: AudioInput) -> Result<String, ProviderError> {
        let backend = self.backend.clone();
        self.rotate("transcribe", move |credential| {
            let backend = backend.clone();
            let audio = audio.clone();
            async move { backend.transcribe(&credential, &audio).await }
        })
        .await
    }
}

impl std::fmt::Debug for CompletionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionGateway")
            .field("backend", &self.backend.name())
            .field("pool", &self.pool)
            .field("max_attempts", &self.max_attempts)
            .field("base_backoff", &self.base_backoff)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted behaviour per credential secret.
    #[derive(Clone)]
    enum Behaviour {
        Succeed,
        RateLimit,
        Fail,
        Hang,
        Reject,
        /// Fail this many times, then succeed
        FlakyThenSucceed(usize),
    }

    /// A backend whose behaviour depends on which credential it is called with.
    struct ScriptedBackend {
        behaviours: Vec<(String, Behaviour)>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(behaviours: Vec<(&str, Behaviour)>) -> Self {
            Self {
                behaviours: behaviours
                    .into_iter()
                    .map(|(k, b)| (k.to_string(), b))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn keys(&self) -> Vec<String> {
            self.behaviours.iter().map(|(k, _)| k.clone()).collect()
        }

        async fn respond(&self, credential: &Credential) -> Result<String, ProviderError> {
            let key = credential.expose().to_string();
            let prior = {
                let mut calls = self.calls.lock().unwrap();
                let prior = calls.iter().filter(|c| **c == key).count();
                calls.push(key.clone());
                prior
            };
            let behaviour = self
                .behaviours
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, b)| b.clone())
                .unwrap();

            match behaviour {
                Behaviour::Succeed => Ok(format!("ok from {key}")),
                Behaviour::RateLimit => Err(ProviderError::RateLimited { retry_after_secs: 5 }),
                Behaviour::Fail => Err(ProviderError::Network(format!("{key} unreachable"))),
                Behaviour::Reject => Err(ProviderError::AuthenticationFailed("bad key".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("too late".into())
                }
                Behaviour::FlakyThenSucceed(n) if prior < n => {
                    Err(ProviderError::ApiError { status_code: 503, message: "overloaded".into() })
                }
                Behaviour::FlakyThenSucceed(_) => Ok(format!("ok from {key}")),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            credential: &Credential,
            _request: &CompletionRequest,
        ) -> Result<String, ProviderError> {
            self.respond(credential).await
        }

        async fn transcribe(
            &self,
            credential: &Credential,
            _audio: &AudioInput,
        ) -> Result<String, ProviderError> {
            self.respond(credential).await.map(|t| format!("transcript: {t}"))
        }
    }

    fn gateway(backend: Arc<ScriptedBackend>) -> CompletionGateway {
        let pool = KeyPool::from_secrets(backend.keys());
        CompletionGateway::new(backend, pool)
            .with_base_backoff(Duration::from_millis(100))
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn first_credential_success() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("k1", Behaviour::Succeed),
            ("k2", Behaviour::Succeed),
        ]));
        let gw = gateway(backend.clone());

        let text = gw.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(text, "ok from k1");
        assert_eq!(backend.calls(), vec!["k1"]);
        // cursor advanced past the working credential
        gw.complete(CompletionRequest::new("again")).await.unwrap();
        assert_eq!(backend.calls(), vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn rate_limited_credentials_skip_without_backoff() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("k1", Behaviour::RateLimit),
            ("k2", Behaviour::RateLimit),
            ("k3", Behaviour::RateLimit),
            ("k4", Behaviour::Succeed),
        ]));
        let gw = gateway(backend.clone());

        let text = gw.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(text, "ok from k4");

        let stats = gw.stats();
        assert_eq!(stats.attempts, 4);
        assert_eq!(stats.backoff_sleeps, 0);
        assert_eq!(stats.rate_limit_skips, 3);
        assert_eq!(backend.calls(), vec!["k1", "k2", "k3", "k4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn generic_failures_exhaust_pool_with_single_aggregated_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("k1", Behaviour::Fail),
            ("k2", Behaviour::Fail),
            ("k3", Behaviour::Fail),
        ]));
        let gw = gateway(backend.clone());

        let err = gw.complete(CompletionRequest::new("hi")).await.unwrap_err();
        match &err {
            ProviderError::Exhausted { credentials, attempts, last_error } => {
                assert_eq!(*credentials, 3);
                assert_eq!(*attempts, 9);
                assert!(last_error.to_string().contains("k3 unreachable"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }

        // three attempts per credential, two sleeps between them
        let stats = gw.stats();
        assert_eq!(stats.attempts, 9);
        assert_eq!(stats.backoff_sleeps, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn flaky_credential_recovers_within_budget() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("k1", Behaviour::FlakyThenSucceed(2)),
            ("k2", Behaviour::Succeed),
        ]));
        let gw = gateway(backend.clone());

        let started = tokio::time::Instant::now();
        let text = gw.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(text, "ok from k1");
        assert_eq!(backend.calls(), vec!["k1", "k1", "k1"]);
        // 100ms + 200ms of exponential backoff
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_count_as_generic_failures() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("k1", Behaviour::Hang),
            ("k2", Behaviour::Succeed),
        ]));
        let gw = gateway(backend.clone()).with_max_attempts(2);

        let text = gw.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(text, "ok from k2");
        assert_eq!(backend.calls(), vec!["k1", "k1", "k2"]);
        assert_eq!(gw.stats().backoff_sleeps, 1);
    }

    #[tokio::test]
    async fn rejected_credential_rotates_immediately() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("k1", Behaviour::Reject),
            ("k2", Behaviour::Succeed),
        ]));
        let gw = gateway(backend.clone());

        gw.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(backend.calls(), vec!["k1", "k2"]);
        assert_eq!(gw.stats().backoff_sleeps, 0);
    }

    #[tokio::test]
    async fn empty_pool_is_not_configured() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let gw = gateway(backend);
        let err = gw.complete(CompletionRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn transcription_uses_same_rotation() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("k1", Behaviour::RateLimit),
            ("k2", Behaviour::Succeed),
        ]));
        let gw = gateway(backend.clone());

        let audio = AudioInput::new(vec![0u8; 16], "clip.wav", "audio/wav");
        let text = gw.transcribe(audio).await.unwrap();
        assert_eq!(text, "transcript: ok from k2");
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let gw = gateway(backend);
        assert_eq!(gw.backoff_for(1), Duration::from_millis(100));
        assert_eq!(gw.backoff_for(2), Duration::from_millis(200));
        assert_eq!(gw.backoff_for(3), Duration::from_millis(400));
    }
}
