//! Adversarial Deep Dive: Hypothesis → Adversary → Judge.
//!
//! The hypothesis stage proposes up to three causes from a moderate digest.
//! The adversary stage is shown evidence withheld from the first stage
//! (radar backscatter, soil lab readings) and told to disprove each cause;
//! one survives. The judge stage weighs the survivor against the farmer's
//! profile and recent actions and writes the plan.

use agrow_core::context::ContextBundle;
use agrow_core::error::ProviderError;
use agrow_core::provider::TextCompleter;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::{ReasoningProtocol, call_stage};
use crate::digest::deep_dive_digest;
use crate::intent::IntentResult;
use crate::priority::PriorityTiers;
use crate::prompts::{DEEP_DIVE_ADVERSARY, DEEP_DIVE_HYPOTHESIS, DEEP_DIVE_JUDGE, fill};
use crate::schema::{AdversaryVerdict, HypothesisSet, JudgeVerdict, StagePayload};
use crate::stage::{ReasoningResult, StageName, StageResult, clamp_unit};

/// Used when the adversary does not report a confidence of its own.
const DEFAULT_CONFIDENCE: f64 = 0.9;

pub struct AdversarialDeepDive {
    completer: Arc<dyn TextCompleter>,
}

impl AdversarialDeepDive {
    pub fn new(completer: Arc<dyn TextCompleter>) -> Self {
        Self { completer }
    }
}

/// Section labels (`[HEALTH_SIGNALS]`, ...) a digest rendered.
fn digest_sections(digest: &str) -> Vec<String> {
    digest
        .lines()
        .filter_map(|line| line.strip_prefix('['))
        .filter_map(|rest| rest.split_once(']'))
        .map(|(label, _)| label.to_string())
        .collect()
}

#[async_trait]
impl ReasoningProtocol for AdversarialDeepDive {
    fn name(&self) -> &str {
        "adversarial"
    }

    async fn run(
        &self,
        query: &str,
        intent: &IntentResult,
        bundle: &ContextBundle,
        _tiers: &PriorityTiers,
    ) -> Result<ReasoningResult, ProviderError> {
        info!(intent = %intent.primary_intent, "Executing deep dive (3 calls)");
        let completer = self.completer.as_ref();

        // ── Stage A: hypotheses ──
        let digest = deep_dive_digest(bundle, StageName::Hypothesis);
        let prompt = fill(DEEP_DIVE_HYPOTHESIS, &[("query", query), ("context", &digest)]);
        let reply = call_stage(completer, StageName::Hypothesis, prompt, |_| {
            HypothesisSet::fallback()
        })
        .await?;
        let hypotheses = reply.payload;
        info!(count = hypotheses.hypotheses.len(), "Hypotheses proposed");
        let hypothesis_stage = StageResult::new(StageName::Hypothesis, hypotheses.to_output(), 0.0)
            .with_context_used(digest_sections(&digest))
            .with_raw_response(reply.raw);

        // ── Stage B: adversarial check ──
        let digest = deep_dive_digest(bundle, StageName::Adversary);
        let listed = serde_json::to_string_pretty(&hypotheses).unwrap_or_default();
        let prompt = fill(
            DEEP_DIVE_ADVERSARY,
            &[("query", query), ("hypotheses", &listed), ("context", &digest)],
        );
        let reply = call_stage(completer, StageName::Adversary, prompt, |_| {
            AdversaryVerdict::fallback()
        })
        .await?;
        let adversary = reply.payload;
        let adversary_confidence = adversary.confidence.map(clamp_unit);
        let carried = adversary_confidence.unwrap_or(DEFAULT_CONFIDENCE);
        info!(
            surviving = %adversary.surviving_hypothesis,
            confidence = carried,
            "Adversarial check complete"
        );
        let adversary_stage = StageResult::new(StageName::Adversary, adversary.to_output(), carried)
            .with_context_used(digest_sections(&digest))
            .with_raw_response(reply.raw);

        // ── Stage C: verdict ──
        let winner = adversary.surviving_hypothesis.as_str();
        let digest = deep_dive_digest(bundle, StageName::Judge);
        let prompt = fill(
            DEEP_DIVE_JUDGE,
            &[("query", query), ("hypothesis", winner), ("context", &digest)],
        );
        let reply = call_stage(completer, StageName::Judge, prompt, |_| {
            JudgeVerdict::fallback(winner)
        })
        .await?;
        let judge = reply.payload;
        let judge_stage = StageResult::new(StageName::Judge, judge.to_output(), carried)
            .with_context_used(digest_sections(&digest))
            .with_raw_response(reply.raw);

        let final_diagnosis = judge
            .final_diagnosis
            .clone()
            .unwrap_or_else(|| winner.to_string());
        let root_cause = if judge.root_cause.trim().is_empty() {
            final_diagnosis.clone()
        } else {
            judge.root_cause.clone()
        };
        let final_confidence = carried;
        info!(diagnosis = %final_diagnosis, confidence = final_confidence, "Deep dive verdict");

        Ok(ReasoningResult {
            protocol: self.name().to_string(),
            stages: vec![hypothesis_stage, adversary_stage, judge_stage],
            final_diagnosis,
            final_confidence,
            causal_chain: judge.detailed_reasoning,
            root_cause,
            symptoms: Vec::new(),
            recommendation: judge.action_plan.render(),
            evidence_summary: BTreeMap::from([(
                "method".to_string(),
                vec!["deep_dive_3_stage".to_string()],
            )]),
        })
    }
}
