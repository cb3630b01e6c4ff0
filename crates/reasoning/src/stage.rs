//! Stage and pipeline result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Which reasoning path a query took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingMode {
    FastLane,
    DeepDive,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::FastLane => "FAST_LANE",
            RoutingMode::DeepDive => "DEEP_DIVE",
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of one call-and-parse round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    FastLane,
    Hypothesis,
    Adversary,
    Judge,
    Claim,
    Validate,
    Contradict,
    Confirm,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::FastLane => "fast_lane",
            StageName::Hypothesis => "hypothesis",
            StageName::Adversary => "adversary",
            StageName::Judge => "judge",
            StageName::Claim => "claim",
            StageName::Validate => "validate",
            StageName::Contradict => "contradict",
            StageName::Confirm => "confirm",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one stage. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageName,
    /// The parsed (or fallback) payload for this stage's schema.
    pub output: Value,
    /// Names of the context fields the stage was shown.
    pub context_used: Vec<String>,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub raw_response: String,
}

impl StageResult {
    pub fn new(stage: StageName, output: Value, confidence: f64) -> Self {
        Self {
            stage,
            output,
            context_used: Vec::new(),
            confidence: clamp_unit(confidence),
            raw_response: String::new(),
        }
    }

    pub fn with_context_used(mut self, keys: Vec<String>) -> Self {
        self.context_used = keys;
        self
    }

    pub fn with_raw_response(mut self, raw: impl Into<String>) -> Self {
        self.raw_response = raw.into();
        self
    }

    fn field(&self, key: &str) -> Option<String> {
        match self.output.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// The hypothesis this stage worked with, if its schema carries one.
    pub fn hypothesis(&self) -> Option<String> {
        match self.stage {
            StageName::Hypothesis => {
                let causes: Vec<String> = self
                    .output
                    .get("hypotheses")
                    .and_then(Value::as_array)?
                    .iter()
                    .filter_map(|h| h.get("cause").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                (!causes.is_empty()).then(|| causes.join(", "))
            }
            StageName::Claim | StageName::Validate => self.field("hypothesis"),
            StageName::Contradict => self.field("alternative_hypothesis"),
            StageName::Confirm | StageName::Judge => self.field("root_cause"),
            StageName::FastLane | StageName::Adversary => None,
        }
    }

    /// The stage's verdict in one line.
    pub fn verdict(&self) -> Option<String> {
        match self.stage {
            StageName::FastLane => self.field("diagnosis"),
            StageName::Hypothesis => None,
            StageName::Adversary => self.field("surviving_hypothesis"),
            StageName::Judge | StageName::Confirm => self.field("final_diagnosis"),
            StageName::Claim => self.field("initial_claim"),
            StageName::Validate => self.field("validation_result"),
            StageName::Contradict => self.field("reasoning"),
        }
    }
}

/// Terminal aggregate of a reasoning protocol run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResult {
    /// Name of the protocol that produced this result.
    pub protocol: String,
    pub stages: Vec<StageResult>,
    pub final_diagnosis: String,
    pub final_confidence: f64,
    pub causal_chain: String,
    pub root_cause: String,
    pub symptoms: Vec<String>,
    pub recommendation: String,
    pub evidence_summary: BTreeMap<String, Vec<String>>,
}

impl ReasoningResult {
    pub fn stage(&self, name: StageName) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

/// Clamp into `[0, 1]`; NaN becomes 0.
pub fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn routing_mode_wire_names() {
        assert_eq!(serde_json::to_value(RoutingMode::FastLane).unwrap(), json!("FAST_LANE"));
        assert_eq!(RoutingMode::DeepDive.to_string(), "DEEP_DIVE");
    }

    #[test]
    fn confidences_are_clamped() {
        assert_eq!(StageResult::new(StageName::Claim, json!({}), 1.7).confidence, 1.0);
        assert_eq!(StageResult::new(StageName::Claim, json!({}), -0.2).confidence, 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }

    #[test]
    fn hypothesis_and_verdict_by_stage() {
        let hyp = StageResult::new(
            StageName::Hypothesis,
            json!({"hypotheses": [{"cause": "water_stress"}, {"cause": "nitrogen"}]}),
            0.0,
        );
        assert_eq!(hyp.hypothesis().as_deref(), Some("water_stress, nitrogen"));
        assert_eq!(hyp.verdict(), None);

        let confirm = StageResult::new(
            StageName::Confirm,
            json!({"final_diagnosis": "drought", "root_cause": "no irrigation"}),
            0.8,
        );
        assert_eq!(confirm.verdict().as_deref(), Some("drought"));
        assert_eq!(confirm.hypothesis().as_deref(), Some("no irrigation"));
    }
}
