//! Fast Lane: a single call over a compact snapshot.
//!
//! Used for simple, confidently classified questions. The model sees only
//! the health and moisture indices, a short weather line with risk flags,
//! and the affected-area note, and answers in one structured reply.

use agrow_core::context::ContextBundle;
use agrow_core::error::ProviderError;
use agrow_core::provider::TextCompleter;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::{ReasoningProtocol, call_stage};
use crate::digest::fast_lane_digest;
use crate::intent::IntentResult;
use crate::priority::PriorityTiers;
use crate::prompts::{FAST_LANE, fill};
use crate::schema::{FastLaneVerdict, StagePayload};
use crate::stage::{ReasoningResult, StageName, StageResult, clamp_unit};

pub struct FastLane {
    completer: Arc<dyn TextCompleter>,
}

impl FastLane {
    pub fn new(completer: Arc<dyn TextCompleter>) -> Self {
        Self { completer }
    }
}

#[async_trait]
impl ReasoningProtocol for FastLane {
    fn name(&self) -> &str {
        "fast_lane"
    }

    async fn run(
        &self,
        query: &str,
        intent: &IntentResult,
        bundle: &ContextBundle,
        tiers: &PriorityTiers,
    ) -> Result<ReasoningResult, ProviderError> {
        info!(intent = %intent.primary_intent, "Executing fast lane (1 call)");

        let digest = fast_lane_digest(bundle);
        let prompt = fill(FAST_LANE, &[("query", query), ("context", &digest)]);
        let reply = call_stage(self.completer.as_ref(), StageName::FastLane, prompt, |_| {
            FastLaneVerdict::fallback()
        })
        .await?;

        let verdict = reply.payload;
        let confidence = clamp_unit(verdict.confidence.unwrap_or(0.0));
        let stage = StageResult::new(StageName::FastLane, verdict.to_output(), confidence)
            .with_context_used(tiers.keys(1))
            .with_raw_response(reply.raw);

        info!(diagnosis = %verdict.diagnosis, confidence, "Fast lane verdict");

        Ok(ReasoningResult {
            protocol: self.name().to_string(),
            stages: vec![stage],
            final_diagnosis: verdict.diagnosis.clone(),
            final_confidence: confidence,
            causal_chain: verdict.reasoning_trace,
            root_cause: verdict.diagnosis,
            symptoms: Vec::new(),
            recommendation: verdict.action,
            evidence_summary: BTreeMap::from([(
                "method".to_string(),
                vec!["fast_lane_optimization".to_string()],
            )]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::classify;
    use crate::priority::build_staged_context;
    use crate::protocol::test_helpers::ScriptedCompleter;
    use serde_json::json;

    fn dry_field() -> ContextBundle {
        ContextBundle::from_value(json!({
            "vegetation_indices": {"NDVI": 0.42, "SMI": 0.15},
            "weather": {
                "current": {"temp": 36, "precip": 0},
                "rolling_stats": {"total_precip_7d": 2},
                "stress_indicators": {"drought_risk": true}
            }
        }))
        .unwrap()
    }

    async fn run_with(
        completer: Arc<ScriptedCompleter>,
        bundle: &ContextBundle,
    ) -> ReasoningResult {
        let intent = classify("Is my field too dry?");
        let tiers = build_staged_context(intent.primary_intent, bundle);
        FastLane::new(completer)
            .run("Is my field too dry?", &intent, bundle, &tiers)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn single_call_maps_verdict() {
        let completer = Arc::new(ScriptedCompleter::texts(&[r#"```json
{"reasoning_trace": "SMI is low and little rain", "diagnosis": "Low soil moisture, water stress",
 "confidence": 0.86, "action": "Irrigate within 24 hours"}
```"#]));
        let bundle = dry_field();
        let result = run_with(completer.clone(), &bundle).await;

        assert_eq!(completer.call_count(), 1);
        assert_eq!(result.protocol, "fast_lane");
        assert!(result.final_diagnosis.contains("moisture"));
        assert_eq!(result.final_confidence, 0.86);
        assert_eq!(result.recommendation, "Irrigate within 24 hours");
        assert_eq!(result.causal_chain, "SMI is low and little rain");
        assert_eq!(result.evidence_summary["method"], vec!["fast_lane_optimization"]);
        assert_eq!(result.stages.len(), 1);
        assert!(result.stages[0].context_used.contains(&"SMI".to_string()));
    }

    #[tokio::test]
    async fn prompt_carries_the_compact_snapshot() {
        let completer = Arc::new(ScriptedCompleter::texts(&["{}"]));
        run_with(completer.clone(), &dry_field()).await;

        let prompt = &completer.prompts()[0];
        assert!(prompt.contains("Is my field too dry?"));
        assert!(prompt.contains("[WATER_SIGNALS] SMI:0.15(critical_moisture_deficit)"));
        assert!(prompt.contains("7-day rain: 2mm"));
        assert!(prompt.contains("[ALERTS] DROUGHT_RISK"));
        assert!(completer.requests()[0].system.is_some());
    }

    #[tokio::test]
    async fn malformed_reply_uses_fallback() {
        let completer = Arc::new(ScriptedCompleter::texts(&["I think it's dry, maybe."]));
        let result = run_with(completer, &dry_field()).await;

        assert_eq!(result.final_diagnosis, "Unknown");
        assert_eq!(result.final_confidence, 0.0);
        assert_eq!(result.recommendation, "Consult expert");
        assert_eq!(result.stages[0].raw_response, "I think it's dry, maybe.");
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_clamped() {
        let completer = Arc::new(ScriptedCompleter::texts(&[
            r#"{"diagnosis": "ok", "confidence": 7}"#,
        ]));
        let result = run_with(completer, &dry_field()).await;
        assert_eq!(result.final_confidence, 1.0);
    }

    #[tokio::test]
    async fn exhaustion_propagates() {
        let completer = Arc::new(ScriptedCompleter::exhausted());
        let bundle = dry_field();
        let intent = classify("Is my field too dry?");
        let tiers = build_staged_context(intent.primary_intent, &bundle);
        let err = FastLane::new(completer)
            .run("Is my field too dry?", &intent, &bundle, &tiers)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Exhausted { .. }));
    }
}
