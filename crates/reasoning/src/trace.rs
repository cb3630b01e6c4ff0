//! Reasoning traces and follow-up suggestions.
//!
//! A trace is a serializable snapshot of what every stage concluded and
//! which context it was shown. It is returned to clients for transparency
//! and never read back for control flow.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::intent::{Intent, IntentResult};
use crate::priority::{PriorityTiers, TierKeys};
use crate::stage::{ReasoningResult, RoutingMode, StageName};

/// One stage as it appears in a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    pub stage: StageName,
    pub hypothesis: Option<String>,
    pub result: Option<String>,
    pub confidence: f64,
    pub context_used: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub intent_detected: Intent,
    pub intent_confidence: f64,
    pub sub_intents: Vec<String>,
    pub routing_mode: RoutingMode,
    pub protocol: String,
    pub stages: Vec<StageTrace>,
    pub causal_chain: String,
    pub root_cause: String,
    pub symptoms: Vec<String>,
    pub evidence_summary: BTreeMap<String, Vec<String>>,
    pub context_priority_used: TierKeys,
    pub suggested_followups: Vec<String>,
}

/// Template follow-up questions for an intent.
pub fn followups_for(intent: Intent) -> Vec<String> {
    let questions: [&str; 3] = match intent {
        Intent::VegetationHealth => [
            "Which part of my field is most affected?",
            "How much water/fertilizer should I apply?",
            "Will this damage spread if I don't act now?",
        ],
        Intent::WaterStress => [
            "How much should I irrigate?",
            "Is rain expected this week?",
            "Which zone needs water most urgently?",
        ],
        Intent::NutrientStatus => [
            "Which fertilizer should I use?",
            "How much fertilizer per acre?",
            "When is the best time to apply?",
        ],
        Intent::PestDisease => [
            "What pesticide should I use?",
            "How fast is this spreading?",
            "Should I quarantine the affected area?",
        ],
        Intent::ForecastQuery => [
            "What should I prepare for?",
            "How will weather affect my crop next week?",
            "When is the best time to harvest?",
        ],
        Intent::ActionRecommendation => [
            "How soon should I act?",
            "What's the most cost-effective solution?",
            "Can I wait for rain instead of irrigating?",
        ],
        _ => [
            "What should I do next?",
            "Is my crop at risk?",
            "How can I prevent this in the future?",
        ],
    };
    questions.iter().map(|q| q.to_string()).collect()
}

pub fn build_trace(
    intent: &IntentResult,
    mode: RoutingMode,
    result: &ReasoningResult,
    tiers: &PriorityTiers,
    followups: Vec<String>,
) -> TraceRecord {
    TraceRecord {
        intent_detected: intent.primary_intent,
        intent_confidence: intent.confidence,
        sub_intents: intent.sub_intents.clone(),
        routing_mode: mode,
        protocol: result.protocol.clone(),
        stages: result
            .stages
            .iter()
            .map(|s| StageTrace {
                stage: s.stage,
                hypothesis: s.hypothesis(),
                result: s.verdict(),
                confidence: s.confidence,
                context_used: s.context_used.clone(),
            })
            .collect(),
        causal_chain: result.causal_chain.clone(),
        root_cause: result.root_cause.clone(),
        symptoms: result.symptoms.clone(),
        evidence_summary: result.evidence_summary.clone(),
        context_priority_used: tiers.exposed_keys(),
        suggested_followups: followups,
    }
}
