//! Response synthesis: turn a verdict into prose for the farmer.

use agrow_core::context::ContextBundle;
use agrow_core::error::ProviderError;
use agrow_core::message::StoredMessage;
use agrow_core::provider::{CompletionRequest, TextCompleter};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::digest::{conversation_digest, trend_digest, weather_digest, zone_digest};
use crate::persona::instructions_for;
use crate::prompts::{COMPACT_RESPONSE, RESPONSE, SYSTEM_PROMPT, fill};
use crate::stage::{ReasoningResult, RoutingMode};

#[derive(Serialize)]
struct DiagnosisView<'a> {
    diagnosis: &'a str,
    confidence: f64,
    causal_chain: &'a str,
    root_cause: &'a str,
    symptoms: &'a [String],
    recommendation: &'a str,
}

impl<'a> From<&'a ReasoningResult> for DiagnosisView<'a> {
    fn from(r: &'a ReasoningResult) -> Self {
        Self {
            diagnosis: &r.final_diagnosis,
            confidence: r.final_confidence,
            causal_chain: &r.causal_chain,
            root_cause: &r.root_cause,
            symptoms: &r.symptoms,
            recommendation: &r.recommendation,
        }
    }
}

/// One-line diagnosis for the compact prompt.
pub fn minimal_diagnosis(result: &ReasoningResult) -> String {
    format!(
        "diag:{} conf:{:.2} cause:{}",
        result.final_diagnosis, result.final_confidence, result.root_cause
    )
}

pub struct Synthesizer {
    completer: Arc<dyn TextCompleter>,
    max_tokens: u32,
    compact_max_tokens: u32,
}

impl Synthesizer {
    pub fn new(completer: Arc<dyn TextCompleter>) -> Self {
        Self {
            completer,
            max_tokens: 1500,
            compact_max_tokens: 300,
        }
    }

    /// Token cap for the full five-section answer.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    /// Token cap for the short Fast Lane answer.
    pub fn with_compact_max_tokens(mut self, max: u32) -> Self {
        self.compact_max_tokens = max;
        self
    }

    /// Build the synthesis request without sending it.
    pub fn request(
        &self,
        query: &str,
        result: &ReasoningResult,
        bundle: &ContextBundle,
        mode: RoutingMode,
        history: &[StoredMessage],
    ) -> CompletionRequest {
        let persona = instructions_for(bundle);
        let weather = weather_digest(bundle);
        let zones = zone_digest(bundle);

        let (prompt, max_tokens) = match mode {
            RoutingMode::FastLane => {
                let diagnosis = minimal_diagnosis(result);
                let prompt = fill(
                    COMPACT_RESPONSE,
                    &[
                        ("persona_instructions", &persona),
                        ("query", query),
                        ("diagnosis", &diagnosis),
                        ("weather_context", &weather),
                        ("zone_context", &zones),
                    ],
                );
                (prompt, self.compact_max_tokens)
            }
            RoutingMode::DeepDive => {
                let diagnosis =
                    serde_json::to_string_pretty(&DiagnosisView::from(result)).unwrap_or_default();
                let evidence =
                    serde_json::to_string_pretty(&result.evidence_summary).unwrap_or_default();
                let conversation = conversation_digest(history);
                let trends = trend_digest(bundle);
                let prompt = fill(
                    RESPONSE,
                    &[
                        ("persona_instructions", &persona),
                        ("conversation_history", &conversation),
                        ("query", query),
                        ("diagnosis", &diagnosis),
                        ("evidence", &evidence),
                        ("weather_context", &weather),
                        ("zone_context", &zones),
                        ("trend_context", &trends),
                    ],
                );
                (prompt, self.max_tokens)
            }
        };

        CompletionRequest::new(prompt)
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(max_tokens)
    }

    /// Write the final answer. One completion call.
    pub async fn respond(
        &self,
        query: &str,
        result: &ReasoningResult,
        bundle: &ContextBundle,
        mode: RoutingMode,
        history: &[StoredMessage],
    ) -> Result<String, ProviderError> {
        let request = self.request(query, result, bundle, mode, history);
        debug!(mode = %mode, prompt_chars = request.prompt.len(), "Synthesizing response");
        let text = self.completer.complete(request).await?;
        info!(mode = %mode, chars = text.len(), "Response synthesized");
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_helpers::ScriptedCompleter;
    use agrow_core::message::Role;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn result() -> ReasoningResult {
        ReasoningResult {
            protocol: "adversarial".into(),
            stages: vec![],
            final_diagnosis: "water_stress".into(),
            final_confidence: 0.834,
            causal_chain: "No rain -> low SMI".into(),
            root_cause: "irrigation gap".into(),
            symptoms: vec!["wilting".into()],
            recommendation: "Irrigate".into(),
            evidence_summary: BTreeMap::from([("method".into(), vec!["deep_dive_3_stage".into()])]),
        }
    }

    fn bundle() -> ContextBundle {
        ContextBundle::from_value(json!({
            "persona": {"instructions": "Speak simply."},
            "zone_analysis": {"priority_zones": [{"location": "Northeast", "stress_score": 0.72}]},
            "historical_trends": {"summary": "NDVI falling"},
            "weather": {"rolling_stats": {"total_precip_7d": 2}}
        }))
        .unwrap()
    }

    #[test]
    fn deep_dive_prompt_has_every_section() {
        let synth = Synthesizer::new(Arc::new(ScriptedCompleter::texts(&[])));
        let history = vec![StoredMessage::new("s1", Role::User, "Is my field dry?", true)];
        let req = synth.request(
            "Why wilting?",
            &result(),
            &bundle(),
            RoutingMode::DeepDive,
            &history,
        );

        assert_eq!(req.max_tokens, Some(1500));
        assert!(req.prompt.starts_with("\nSpeak simply."));
        assert!(req.prompt.contains("User: Is my field dry?"));
        assert!(req.prompt.contains("\"root_cause\": \"irrigation gap\""));
        assert!(req.prompt.contains("deep_dive_3_stage"));
        assert!(req.prompt.contains("1. Northeast - Stress: 72%"));
        assert!(req.prompt.contains("HISTORICAL TRENDS:\nNDVI falling"));
        assert!(req.prompt.contains("Total Rainfall: 2 mm"));
        assert!(req.prompt.contains("**NEXT STEPS**"));
    }

    #[test]
    fn fast_lane_prompt_is_compact() {
        let synth = Synthesizer::new(Arc::new(ScriptedCompleter::texts(&[])))
            .with_compact_max_tokens(200);
        let req = synth.request("Dry?", &result(), &bundle(), RoutingMode::FastLane, &[]);

        assert_eq!(req.max_tokens, Some(200));
        assert!(req.prompt.contains("DIAG:diag:water_stress conf:0.83 cause:irrigation gap"));
        assert!(!req.prompt.contains("HISTORICAL TRENDS"));
        assert!(req.prompt.contains("Keep <100 words."));
    }

    #[tokio::test]
    async fn respond_trims_and_propagates_exhaustion() {
        let completer = Arc::new(ScriptedCompleter::texts(&["  **DIAGNOSIS & STATUS**\n...  "]));
        let synth = Synthesizer::new(completer.clone());
        let text = synth
            .respond("Dry?", &result(), &bundle(), RoutingMode::DeepDive, &[])
            .await
            .unwrap();
        assert_eq!(text, "**DIAGNOSIS & STATUS**\n...");
        assert_eq!(completer.call_count(), 1);

        let synth = Synthesizer::new(Arc::new(ScriptedCompleter::exhausted()));
        assert!(
            synth
                .respond("Dry?", &result(), &bundle(), RoutingMode::FastLane, &[])
                .await
                .is_err()
        );
    }

    #[test]
    fn missing_persona_uses_default_instructions() {
        let synth = Synthesizer::new(Arc::new(ScriptedCompleter::texts(&[])));
        let req = synth.request(
            "Dry?",
            &result(),
            &ContextBundle::new(),
            RoutingMode::FastLane,
            &[],
        );
        assert!(req.prompt.starts_with("Provide clear, helpful farming advice."));
        assert!(req.prompt.contains("No weather data available."));
        assert!(req.prompt.contains("No zone-specific data available."));
    }
}
