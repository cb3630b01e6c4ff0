//! Staged Deep Dive: Claim → Validate → Contradict → Confirm.
//!
//! Each stage sees exactly one priority tier: the claim is made from tier 1
//! alone, validated against tier 2, challenged with tier 3, and settled
//! against tier 4. Confidence is carried forward explicitly; a stage whose
//! reply omits one inherits the previous stage's.
//!
//! The confirm stage's fallback picks whichever of the two competing
//! hypotheses entered with the higher confidence, the incumbent winning
//! ties. A contradict stage that found no contradiction contributes no
//! competitor at all.

use agrow_core::context::ContextBundle;
use agrow_core::error::ProviderError;
use agrow_core::provider::TextCompleter;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::{ReasoningProtocol, call_stage};
use crate::digest::tier_digest;
use crate::intent::IntentResult;
use crate::priority::{PriorityTiers, Tier};
use crate::prompts::{CLAIM, CONFIRM, CONTRADICT, VALIDATE, fill};
use crate::schema::{Claim, Confirmation, Contradiction, StagePayload, Validation};
use crate::stage::{ReasoningResult, StageName, StageResult, clamp_unit};

/// Confidence assumed before the claim stage reports one.
const INITIAL_CONFIDENCE: f64 = 0.5;

const NO_ALTERNATIVE: &str = "none";

pub struct StagedDeepDive {
    completer: Arc<dyn TextCompleter>,
}

impl StagedDeepDive {
    pub fn new(completer: Arc<dyn TextCompleter>) -> Self {
        Self { completer }
    }
}

fn tier_at(tiers: &PriorityTiers, level: usize) -> (String, Vec<String>) {
    let empty = Tier::new();
    let tier = tiers.tier(level).unwrap_or(&empty);
    (tier_digest(tier), tier.keys().cloned().collect())
}

#[async_trait]
impl ReasoningProtocol for StagedDeepDive {
    fn name(&self) -> &str {
        "staged"
    }

    async fn run(
        &self,
        query: &str,
        intent: &IntentResult,
        _bundle: &ContextBundle,
        tiers: &PriorityTiers,
    ) -> Result<ReasoningResult, ProviderError> {
        info!(intent = %intent.primary_intent, "Executing staged deep dive (4 calls)");
        let completer = self.completer.as_ref();

        // ── Claim: tier 1 ──
        let (context, primary_keys) = tier_at(tiers, 1);
        let prompt = fill(CLAIM, &[("query", query), ("priority_1_context", &context)]);
        let reply = call_stage(completer, StageName::Claim, prompt, |raw| {
            Claim::fallback(raw, primary_keys.clone())
        })
        .await?;
        let claim = reply.payload;
        let claim_confidence = clamp_unit(claim.confidence.unwrap_or(INITIAL_CONFIDENCE));
        let hypothesis = claim.hypothesis.clone();
        info!(hypothesis = %hypothesis, confidence = claim_confidence, "Claim made");
        let claim_stage = StageResult::new(StageName::Claim, claim.to_output(), claim_confidence)
            .with_context_used(primary_keys.clone())
            .with_raw_response(reply.raw);

        // ── Validate: tier 2 ──
        let (context, supporting_keys) = tier_at(tiers, 2);
        let previous = format!("{claim_confidence:.2}");
        let prompt = fill(
            VALIDATE,
            &[
                ("previous_hypothesis", &hypothesis),
                ("previous_confidence", &previous),
                ("priority_2_context", &context),
            ],
        );
        let reply = call_stage(completer, StageName::Validate, prompt, |_| {
            Validation::fallback(claim_confidence)
        })
        .await?;
        let mut validation = reply.payload;
        validation.hypothesis = hypothesis.clone();
        let validated_confidence =
            clamp_unit(validation.confidence_updated.unwrap_or(claim_confidence));
        info!(
            result = %validation.validation_result,
            confidence = validated_confidence,
            "Hypothesis validated"
        );
        let validate_stage =
            StageResult::new(StageName::Validate, validation.to_output(), validated_confidence)
                .with_context_used(supporting_keys.clone())
                .with_raw_response(reply.raw);

        // ── Contradict: tier 3 ──
        let (context, alternative_keys) = tier_at(tiers, 3);
        let current = format!("{validated_confidence:.2}");
        let prompt = fill(
            CONTRADICT,
            &[
                ("hypothesis", &hypothesis),
                ("confidence", &current),
                ("priority_3_context", &context),
            ],
        );
        let reply = call_stage(completer, StageName::Contradict, prompt, |_| {
            Contradiction::fallback()
        })
        .await?;
        let mut contradiction = reply.payload;
        let contradict_confidence = clamp_unit(
            contradiction
                .alternative_confidence
                .unwrap_or(validated_confidence),
        );
        if contradiction.alternative().is_none() {
            contradiction.discard_alternative();
        }
        let (challenger, challenger_confidence) = match contradiction.alternative() {
            Some(alt) => (alt.to_string(), contradict_confidence),
            None => (NO_ALTERNATIVE.to_string(), 0.0),
        };
        info!(
            found = contradiction.contradiction_found,
            alternative = %challenger,
            confidence = challenger_confidence,
            "Contradictions sought"
        );
        let contradict_stage = StageResult::new(
            StageName::Contradict,
            contradiction.to_output(),
            contradict_confidence,
        )
        .with_context_used(alternative_keys.clone())
        .with_raw_response(reply.raw);

        // ── Confirm: tier 4 ──
        let (context, validation_keys) = tier_at(tiers, 4);
        let shown_challenger = if challenger == NO_ALTERNATIVE {
            "no_alternative"
        } else {
            challenger.as_str()
        };
        let (conf_1, conf_2) = (
            format!("{validated_confidence:.2}"),
            format!("{challenger_confidence:.2}"),
        );
        let prompt = fill(
            CONFIRM,
            &[
                ("hypothesis_1", &hypothesis),
                ("conf_1", &conf_1),
                ("hypothesis_2", shown_challenger),
                ("conf_2", &conf_2),
                ("priority_4_context", &context),
            ],
        );
        let incumbent = (hypothesis.as_str(), validated_confidence);
        let competitor = (challenger.as_str(), challenger_confidence);
        let default = Confirmation::fallback(incumbent, competitor, validation_keys.clone());
        let reply = call_stage(completer, StageName::Confirm, prompt, |_| default.clone()).await?;
        let confirmation = reply.payload;

        let default_diagnosis = default.final_diagnosis.clone().unwrap_or_default();
        let confirmed_confidence = clamp_unit(
            confirmation
                .confidence
                .or(default.confidence)
                .unwrap_or(validated_confidence),
        );
        let final_diagnosis = confirmation
            .final_diagnosis
            .clone()
            .unwrap_or_else(|| default_diagnosis.clone());
        let root_cause = confirmation
            .root_cause
            .clone()
            .unwrap_or_else(|| default_diagnosis.clone());
        info!(
            diagnosis = %final_diagnosis,
            confidence = confirmed_confidence,
            "Diagnosis confirmed"
        );
        let confirm_stage =
            StageResult::new(StageName::Confirm, confirmation.to_output(), confirmed_confidence)
                .with_context_used(validation_keys.clone())
                .with_raw_response(reply.raw);

        let buckets = confirmation.evidence_summary;
        let evidence_summary = BTreeMap::from([
            ("primary".to_string(), primary_keys),
            ("supporting".to_string(), supporting_keys),
            ("alternative".to_string(), alternative_keys),
            ("validation".to_string(), validation_keys),
            ("supporting_evidence".to_string(), buckets.supporting),
            ("contradicting_evidence".to_string(), buckets.contradicting),
            ("inconclusive_evidence".to_string(), buckets.inconclusive),
        ]);

        Ok(ReasoningResult {
            protocol: self.name().to_string(),
            stages: vec![claim_stage, validate_stage, contradict_stage, confirm_stage],
            final_diagnosis,
            final_confidence: confirmed_confidence,
            causal_chain: confirmation.causal_chain,
            root_cause,
            symptoms: confirmation.symptoms,
            recommendation: confirmation.recommendation,
            evidence_summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Intent, classify};
    use crate::priority::build_staged_context;
    use crate::protocol::test_helpers::{ScriptedCompleter, exhausted_error};
    use serde_json::json;

    const QUERY: &str = "Why is the NDRE dropping in my wheat?";

    fn field() -> ContextBundle {
        ContextBundle::from_value(json!({
            "vegetation_indices": {"NDVI": 0.41, "NDRE": 0.22, "SMI": 0.19},
            "field_info": {"crop_type": "wheat", "area_acres": 4.5},
            "weather": {"temperature": 38.2, "heat_stress": true},
            "farmer_actions": {"days_since_irrigation": 8}
        }))
        .unwrap()
    }

    async fn run(completer: Arc<ScriptedCompleter>, bundle: &ContextBundle) -> ReasoningResult {
        let intent = classify(QUERY);
        let tiers = build_staged_context(intent.primary_intent, bundle);
        StagedDeepDive::new(completer)
            .run(QUERY, &intent, bundle, &tiers)
            .await
            .unwrap()
    }

    const CLAIM_REPLY: &str = r#"{"initial_claim": "Chlorophyll is low", "hypothesis": "chlorophyll_deficiency",
        "evidence_cited": ["NDRE: 0.22"], "confidence": 0.72, "uncertainties": ["no weather"]}"#;
    const VALIDATE_REPLY: &str = r#"{"validation_result": "confirmed", "confidence_updated": 0.81,
        "spatial_notes": "northeast", "new_evidence_summary": "EVI low"}"#;

    #[tokio::test]
    async fn four_stages_carry_hypothesis_and_confidence() {
        let completer = Arc::new(ScriptedCompleter::texts(&[
            CLAIM_REPLY,
            VALIDATE_REPLY,
            r#"{"contradiction_found": true, "contradicting_evidence": ["SMI 0.19"],
                "alternative_hypothesis": "water_stress", "alternative_confidence": 0.76,
                "reasoning": "Low SMI and heat"}"#,
            r#"{"final_diagnosis": "water_stress_induced_chlorophyll_decline", "confidence": 0.89,
                "causal_chain": "Heat -> deficit -> decline", "root_cause": "water_stress",
                "symptoms": ["chlorophyll_decline"],
                "evidence_summary": {"supporting": ["no irrigation 8 days"], "contradicting": [], "inconclusive": ["N status"]},
                "recommendation": "Irrigate now"}"#,
        ]));
        let result = run(completer.clone(), &field()).await;
        let prompts = completer.prompts();

        assert_eq!(completer.call_count(), 4);
        assert!(prompts[1].contains("You previously hypothesized: chlorophyll_deficiency"));
        assert!(prompts[1].contains("Initial confidence: 0.72"));
        assert!(
            prompts[2].contains("CURRENT HYPOTHESIS: chlorophyll_deficiency (confidence: 0.81)")
        );
        assert!(prompts[3].contains("1. chlorophyll_deficiency (confidence: 0.81)"));
        assert!(prompts[3].contains("2. water_stress (confidence: 0.76)"));

        assert_eq!(result.protocol, "staged");
        assert_eq!(result.final_diagnosis, "water_stress_induced_chlorophyll_decline");
        assert_eq!(result.final_confidence, 0.89);
        assert_eq!(result.root_cause, "water_stress");
        assert_eq!(result.symptoms, vec!["chlorophyll_decline"]);
        assert_eq!(result.evidence_summary["supporting_evidence"], vec!["no irrigation 8 days"]);
        assert_eq!(result.evidence_summary["inconclusive_evidence"], vec!["N status"]);
        assert!(result.evidence_summary["primary"].contains(&"NDRE".to_string()));
        assert_eq!(
            result.stage(StageName::Validate).unwrap().hypothesis().as_deref(),
            Some("chlorophyll_deficiency")
        );
    }

    #[tokio::test]
    async fn each_stage_sees_only_its_tier() {
        let completer = Arc::new(ScriptedCompleter::repeating("{}", 4));
        let bundle = field();
        let intent = classify(QUERY);
        let tiers = build_staged_context(intent.primary_intent, &bundle);
        StagedDeepDive::new(completer.clone())
            .run(QUERY, &intent, &bundle, &tiers)
            .await
            .unwrap();
        let prompts = completer.prompts();

        for (i, prompt) in prompts.iter().enumerate() {
            let own = tiers.keys(i + 1);
            for key in &own {
                assert!(prompt.contains(&format!("**{key}**")), "stage {} missing {key}", i + 1);
            }
            for other in (1..=4).filter(|&l| l != i + 1) {
                for key in tiers.keys(other).iter().filter(|k| !own.contains(k)) {
                    assert!(!prompt.contains(&format!("**{key}**")), "stage {} saw {key}", i + 1);
                }
            }
        }
    }

    #[tokio::test]
    async fn no_contradiction_keeps_the_validated_hypothesis() {
        // The contradict stage names an alternative but says none was found;
        // the unparseable confirm reply must fall back to the incumbent.
        let completer = Arc::new(ScriptedCompleter::texts(&[
            CLAIM_REPLY,
            r#"{"validation_result": "weakened", "confidence_updated": 0.3}"#,
            r#"{"contradiction_found": false, "alternative_hypothesis": "pest_damage",
                "alternative_confidence": 0.95}"#,
            "unable to decide",
        ]));
        let result = run(completer.clone(), &field()).await;

        assert_eq!(result.final_diagnosis, "chlorophyll_deficiency");
        assert_eq!(result.root_cause, "chlorophyll_deficiency");
        assert_eq!(result.final_confidence, 0.3);
        assert!(completer.prompts()[3].contains("2. no_alternative (confidence: 0.00)"));
        let contradict = result.stage(StageName::Contradict).unwrap();
        assert_eq!(contradict.output["alternative_hypothesis"], "none");
        // The stage keeps the confidence it reported; only the tie-break sees zero.
        assert_eq!(contradict.confidence, 0.95);
    }

    #[tokio::test]
    async fn stronger_alternative_wins_the_tie_break() {
        let completer = Arc::new(ScriptedCompleter::texts(&[
            CLAIM_REPLY,
            r#"{"confidence_updated": 0.4}"#,
            r#"{"contradiction_found": true, "alternative_hypothesis": "water_stress",
                "alternative_confidence": 0.7}"#,
            "",
        ]));
        let result = run(completer, &field()).await;

        assert_eq!(result.final_diagnosis, "water_stress");
        assert_eq!(result.final_confidence, 0.7);
        assert_eq!(result.causal_chain, "water_stress leads to observed symptoms");
        assert_eq!(
            result.recommendation,
            "Further investigation recommended based on available data"
        );
    }

    #[tokio::test]
    async fn missing_confidences_are_inherited() {
        let completer = Arc::new(ScriptedCompleter::texts(&[
            r#"{"hypothesis": "water_stress", "confidence": 0.64}"#,
            r#"{"validation_result": "neutral"}"#,
            r#"{"contradiction_found": false}"#,
            r#"{"final_diagnosis": "water_stress"}"#,
        ]));
        let result = run(completer.clone(), &field()).await;
        let confidences: Vec<f64> = result.stages.iter().map(|s| s.confidence).collect();
        assert_eq!(confidences, vec![0.64, 0.64, 0.64, 0.64]);

        // The discarded alternative still enters the confirm stage at zero.
        let confirm_prompt = &completer.prompts()[3];
        assert!(confirm_prompt.contains("2. no_alternative (confidence: 0.00)"));
        assert!(confirm_prompt.contains("1. water_stress (confidence: 0.64)"));
    }

    #[tokio::test]
    async fn empty_bundle_completes_through_defaults() {
        let completer = Arc::new(ScriptedCompleter::repeating("not json", 4));
        let bundle = ContextBundle::new();
        let intent = classify("hello there");
        assert_eq!(intent.primary_intent, Intent::GeneralQuery);
        let tiers = build_staged_context(intent.primary_intent, &bundle);
        assert!(tiers.is_empty());

        let result = StagedDeepDive::new(completer.clone())
            .run("hello there", &intent, &bundle, &tiers)
            .await
            .unwrap();

        assert!(completer.prompts()[0].contains("No specific data available."));
        assert_eq!(result.stages.len(), 4);
        assert_eq!(result.final_diagnosis, "general_issue");
        assert_eq!(result.final_confidence, 0.5);
        assert_eq!(result.evidence_summary.len(), 7);
        let claim = result.stage(StageName::Claim).unwrap();
        assert_eq!(claim.output["initial_claim"], "not json");
    }

    #[tokio::test]
    async fn exhaustion_stops_the_pipeline() {
        let completer = Arc::new(ScriptedCompleter::new(vec![
            Ok(CLAIM_REPLY.into()),
            Ok(VALIDATE_REPLY.into()),
            Err(exhausted_error()),
        ]));
        let bundle = field();
        let intent = classify(QUERY);
        let tiers = build_staged_context(intent.primary_intent, &bundle);
        let err = StagedDeepDive::new(completer.clone())
            .run(QUERY, &intent, &bundle, &tiers)
            .await
            .unwrap_err();
        assert!(err.last_error().is_some());
        assert_eq!(completer.call_count(), 3);
    }
}
