//! The diagnostic pipeline, end to end.

use agrow_config::AppConfig;
use agrow_core::context::ContextBundle;
use agrow_core::error::ProviderError;
use agrow_core::message::StoredMessage;
use agrow_core::provider::TextCompleter;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::intent::classify;
use crate::priority::build_staged_context;
use crate::router::{ProtocolSet, RoutingPolicy};
use crate::stage::RoutingMode;
use crate::synthesizer::Synthesizer;
use crate::trace::{TraceRecord, build_trace, followups_for};

/// Where known field names live in the context bundle.
const KNOWN_FIELDS_PATH: &str = "persona.all_fields";

/// A finished answer to one query.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub response: String,
    pub routing_mode: RoutingMode,
    pub trace: TraceRecord,
    /// Keys of the first priority tier, the evidence the answer leans on most.
    pub context_used: Vec<String>,
}

pub struct Orchestrator {
    policy: RoutingPolicy,
    protocols: ProtocolSet,
    synthesizer: Synthesizer,
}

impl Orchestrator {
    pub fn new(policy: RoutingPolicy, protocols: ProtocolSet, synthesizer: Synthesizer) -> Self {
        Self {
            policy,
            protocols,
            synthesizer,
        }
    }

    /// Wire the pipeline from configuration over a single completer.
    pub fn from_config(
        config: &AppConfig,
        completer: Arc<dyn TextCompleter>,
    ) -> Result<Self, agrow_core::Error> {
        let to_config_error = |e: crate::router::RoutingError| agrow_core::Error::Config {
            message: e.to_string(),
        };
        let policy = RoutingPolicy::from_config(&config.routing).map_err(to_config_error)?;
        let protocols =
            ProtocolSet::with_deep_dive(completer.clone(), &config.routing.deep_dive_protocol)
                .map_err(to_config_error)?;
        let synthesizer = Synthesizer::new(completer)
            .with_max_tokens(config.synthesis.max_tokens)
            .with_compact_max_tokens(config.synthesis.compact_max_tokens);
        Ok(Self::new(policy, protocols, synthesizer))
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Answer a query with no prior conversation.
    pub async fn answer(
        &self,
        query: &str,
        bundle: &ContextBundle,
    ) -> Result<Answer, ProviderError> {
        self.answer_with_history(query, bundle, &[]).await
    }

    /// Answer a query. Only total backend exhaustion comes back as an error;
    /// every other failure degrades through stage defaults.
    pub async fn answer_with_history(
        &self,
        query: &str,
        bundle: &ContextBundle,
        history: &[StoredMessage],
    ) -> Result<Answer, ProviderError> {
        let intent = classify(query);
        info!(
            intent = %intent.primary_intent,
            confidence = intent.confidence,
            sub_intents = ?intent.sub_intents,
            "Classified query"
        );

        let known_names = bundle.strings(KNOWN_FIELDS_PATH);
        let mode = self.policy.route(query, &intent, &known_names);
        let tiers = build_staged_context(intent.primary_intent, bundle);

        let protocol = self.protocols.for_mode(mode);
        info!(mode = %mode, protocol = protocol.name(), "Running reasoning protocol");
        let result = protocol.run(query, &intent, bundle, &tiers).await?;
        info!(
            diagnosis = %result.final_diagnosis,
            confidence = result.final_confidence,
            stages = result.stages.len(),
            "Reasoning complete"
        );

        let response = self
            .synthesizer
            .respond(query, &result, bundle, mode, history)
            .await?;

        let followups = followups_for(intent.primary_intent);
        let trace = build_trace(&intent, mode, &result, &tiers, followups);

        Ok(Answer {
            response,
            routing_mode: mode,
            trace,
            context_used: tiers.keys(1),
        })
    }
}
