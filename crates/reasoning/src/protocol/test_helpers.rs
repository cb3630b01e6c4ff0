//! Shared test helpers for protocol tests.

use agrow_core::error::ProviderError;
use agrow_core::provider::{CompletionRequest, TextCompleter};
use std::sync::Mutex;

/// A completer that returns a sequence of scripted replies.
///
/// Each call to `complete` returns the next reply in the queue. Panics if
/// more calls are made than replies provided.
pub struct ScriptedCompleter {
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    call_count: Mutex<usize>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompleter {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call succeeds with the given texts, in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// Every call returns the same text.
    pub fn repeating(text: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(text.to_string())).collect())
    }

    /// The first call fails as if every credential were spent.
    pub fn exhausted() -> Self {
        Self::new(vec![Err(exhausted_error())])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TextCompleter for ScriptedCompleter {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let replies = self.replies.lock().unwrap();

        if *count >= replies.len() {
            panic!(
                "ScriptedCompleter: no more replies (call #{}, have {})",
                *count,
                replies.len()
            );
        }

        let reply = replies[*count].clone();
        *count += 1;
        self.requests.lock().unwrap().push(request);
        reply
    }
}

pub fn exhausted_error() -> ProviderError {
    ProviderError::Exhausted {
        credentials: 2,
        attempts: 6,
        last_error: Box::new(ProviderError::Network("connection reset".into())),
    }
}
