//! Reasoning protocols: staged, hypothesis-revising strategies.
//!
//! Three strategies share one interface:
//!
//! 1. **Fast Lane**: one call over a compact digest.
//! 2. **Adversarial Deep Dive**: Hypothesis → Adversary → Judge.
//! 3. **Staged Deep Dive**: Claim → Validate → Contradict → Confirm, with
//!    confidence carried explicitly from stage to stage.
//!
//! Each stage is one call-and-parse round trip. A reply that can't be
//! parsed is replaced by the stage's named fallback payload, so the only
//! error a protocol returns is the completer giving up entirely.

pub mod adversarial;
pub mod fast_lane;
pub mod staged;

pub use adversarial::AdversarialDeepDive;
pub use fast_lane::FastLane;
pub use staged::StagedDeepDive;

use agrow_core::context::ContextBundle;
use agrow_core::error::ProviderError;
use agrow_core::provider::{CompletionRequest, TextCompleter};
use agrow_providers::sanitize;
use async_trait::async_trait;
use tracing::debug;

use crate::intent::IntentResult;
use crate::priority::PriorityTiers;
use crate::prompts::SYSTEM_PROMPT;
use crate::schema::StagePayload;
use crate::stage::{ReasoningResult, StageName};

/// A reasoning strategy selected once per query by the router.
#[async_trait]
pub trait ReasoningProtocol: Send + Sync {
    /// Protocol name as it appears in traces and configuration.
    fn name(&self) -> &str;

    /// Run every stage to completion.
    async fn run(
        &self,
        query: &str,
        intent: &IntentResult,
        bundle: &ContextBundle,
        tiers: &PriorityTiers,
    ) -> Result<ReasoningResult, ProviderError>;
}

/// One stage's reply, raw and parsed.
pub(crate) struct StageReply<T> {
    pub payload: T,
    pub raw: String,
}

/// Send one stage prompt and parse the reply into `T`.
///
/// `fallback` receives the raw reply so defaults can quote it.
pub(crate) async fn call_stage<T, F>(
    completer: &dyn TextCompleter,
    stage: StageName,
    prompt: String,
    fallback: F,
) -> Result<StageReply<T>, ProviderError>
where
    T: StagePayload,
    F: FnOnce(&str) -> T,
{
    debug!(stage = %stage, prompt_chars = prompt.len(), "Calling stage");
    let request = CompletionRequest::new(prompt).with_system(SYSTEM_PROMPT);
    let raw = completer.complete(request).await?;
    let payload = sanitize::parse_or_else(&raw, T::CALL_SITE, || fallback(&raw));
    Ok(StageReply { payload, raw })
}

#[cfg(test)]
pub(crate) mod test_helpers;
