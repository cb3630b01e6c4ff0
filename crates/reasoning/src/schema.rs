//! Structured payloads each stage expects back from the model.
//!
//! Models are loose about types: confidences arrive as strings, lists
//! arrive as single strings, action plans arrive as prose. Every field
//! here deserializes leniently and defaults when absent, so a reply only
//! falls back to the stage's named default when no object can be found
//! at all.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A stage payload with a name for log lines and a JSON projection.
pub trait StagePayload: Serialize + for<'de> Deserialize<'de> {
    /// Identifies the call site in sanitation warnings.
    const CALL_SITE: &'static str;

    fn to_output(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

// ── Lenient field decoders ──────────────────────────────────────────────

mod lenient {
    use super::*;

    pub fn text_of(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => other.to_string(),
        }
    }

    pub fn number_of(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text_of(&Value::deserialize(d)?))
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let s = text_of(&Value::deserialize(d)?);
        Ok((!s.trim().is_empty()).then_some(s))
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(number_of(&Value::deserialize(d)?))
    }

    pub fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .map(text_of)
                .filter(|s| !s.is_empty())
                .collect(),
            other => {
                let s = text_of(&other);
                if s.is_empty() { Vec::new() } else { vec![s] }
            }
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
            Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
            _ => false,
        })
    }
}

fn unknown() -> String {
    "Unknown".into()
}

fn general_issue() -> String {
    "general_issue".into()
}

fn neutral() -> String {
    "neutral".into()
}

fn no_alternative() -> String {
    "none".into()
}

// ── Fast Lane ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastLaneVerdict {
    #[serde(default, deserialize_with = "lenient::text")]
    pub reasoning_trace: String,
    #[serde(default = "unknown", deserialize_with = "lenient::text")]
    pub diagnosis: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub action: String,
}

impl FastLaneVerdict {
    pub fn fallback() -> Self {
        Self {
            reasoning_trace: "Analysis failed".into(),
            diagnosis: unknown(),
            confidence: Some(0.0),
            action: "Consult expert".into(),
        }
    }
}

impl StagePayload for FastLaneVerdict {
    const CALL_SITE: &'static str = "fast_lane";
}

// ── 3-stage deep dive ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    #[serde(default, deserialize_with = "lenient::text")]
    pub cause: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub likelihood: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reason: String,
}

fn hypotheses<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Hypothesis>, D::Error> {
    let Value::Array(items) = Value::deserialize(d)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(_) => serde_json::from_value::<Hypothesis>(item).ok(),
            other => Some(Hypothesis {
                cause: lenient::text_of(&other),
                ..Hypothesis::default()
            }),
        })
        .filter(|h| !h.cause.is_empty())
        .take(3)
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypothesisSet {
    #[serde(default, deserialize_with = "hypotheses")]
    pub hypotheses: Vec<Hypothesis>,
}

impl HypothesisSet {
    pub fn fallback() -> Self {
        Self::default()
    }
}

impl StagePayload for HypothesisSet {
    const CALL_SITE: &'static str = "deep_dive.hypothesis";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypothesisCheck {
    #[serde(default, deserialize_with = "lenient::text")]
    pub cause: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reason: String,
}

fn checks<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<HypothesisCheck>, D::Error> {
    let Value::Array(items) = Value::deserialize(d)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversaryVerdict {
    #[serde(default, deserialize_with = "checks")]
    pub analysis: Vec<HypothesisCheck>,
    #[serde(default = "unknown", deserialize_with = "lenient::text")]
    pub surviving_hypothesis: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence: Option<f64>,
}

impl AdversaryVerdict {
    pub fn fallback() -> Self {
        Self {
            analysis: Vec::new(),
            surviving_hypothesis: unknown(),
            confidence: None,
        }
    }
}

impl StagePayload for AdversaryVerdict {
    const CALL_SITE: &'static str = "deep_dive.adversary";
}

/// Immediate and long-term steps. Prose replies land in `immediate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    #[serde(default, deserialize_with = "lenient::text")]
    pub immediate: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub long_term: String,
}

impl ActionPlan {
    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.long_term.is_empty()
    }

    /// One-line rendering for the result's recommendation.
    pub fn render(&self) -> String {
        match (self.immediate.is_empty(), self.long_term.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.immediate.clone(),
            (true, false) => format!("Long-term: {}", self.long_term),
            (false, false) => {
                format!("Immediate: {} Long-term: {}", self.immediate, self.long_term)
            }
        }
    }
}

fn action_plan<'de, D: Deserializer<'de>>(d: D) -> Result<ActionPlan, D::Error> {
    Ok(match Value::deserialize(d)? {
        obj @ Value::Object(_) => serde_json::from_value(obj).unwrap_or_default(),
        other => ActionPlan {
            immediate: lenient::text_of(&other),
            long_term: String::new(),
        },
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub final_diagnosis: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub root_cause: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub detailed_reasoning: String,
    #[serde(default, deserialize_with = "action_plan")]
    pub action_plan: ActionPlan,
}

impl JudgeVerdict {
    /// Default verdict: the adversary's surviving hypothesis, no plan.
    pub fn fallback(winner: &str) -> Self {
        Self {
            final_diagnosis: Some(winner.to_string()),
            ..Self::default()
        }
    }
}

impl StagePayload for JudgeVerdict {
    const CALL_SITE: &'static str = "deep_dive.judge";
}

// ── 4-stage deep dive ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(default, deserialize_with = "lenient::text")]
    pub initial_claim: String,
    #[serde(default = "general_issue", deserialize_with = "lenient::text")]
    pub hypothesis: String,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub evidence_cited: Vec<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub uncertainties: Vec<String>,
}

impl Claim {
    /// Default claim quoting the start of whatever the model said.
    pub fn fallback(raw_response: &str, evidence_keys: Vec<String>) -> Self {
        let claim: String = raw_response.chars().take(200).collect();
        Self {
            initial_claim: if claim.trim().is_empty() {
                "No analysis available".into()
            } else {
                claim
            },
            hypothesis: general_issue(),
            evidence_cited: evidence_keys,
            confidence: Some(0.5),
            uncertainties: vec!["Limited data available".into()],
        }
    }
}

impl StagePayload for Claim {
    const CALL_SITE: &'static str = "staged.claim";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default = "neutral", deserialize_with = "lenient::text")]
    pub validation_result: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence_updated: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub spatial_notes: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub new_evidence_summary: String,
    /// Carried from the claim; never taken from the model.
    #[serde(default, skip_deserializing)]
    pub hypothesis: String,
}

impl Validation {
    pub fn fallback(previous_confidence: f64) -> Self {
        Self {
            validation_result: neutral(),
            confidence_updated: Some(previous_confidence),
            spatial_notes: "Unable to determine spatial distribution".into(),
            new_evidence_summary: String::new(),
            hypothesis: String::new(),
        }
    }
}

impl StagePayload for Validation {
    const CALL_SITE: &'static str = "staged.validate";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub contradiction_found: bool,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub contradicting_evidence: Vec<String>,
    #[serde(default = "no_alternative", deserialize_with = "lenient::text")]
    pub alternative_hypothesis: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub alternative_confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reasoning: String,
}

impl Contradiction {
    pub fn fallback() -> Self {
        Self {
            contradiction_found: false,
            contradicting_evidence: Vec::new(),
            alternative_hypothesis: no_alternative(),
            alternative_confidence: Some(0.0),
            reasoning: "No strong contradicting evidence found".into(),
        }
    }

    /// The competing hypothesis to weigh, or `None` when nothing contradicted.
    pub fn alternative(&self) -> Option<&str> {
        let alt = self.alternative_hypothesis.trim();
        if !self.contradiction_found || alt.is_empty() || alt.eq_ignore_ascii_case("none") {
            return None;
        }
        Some(alt)
    }

    /// Drop the alternative so the incumbent stands unchallenged.
    pub fn discard_alternative(&mut self) {
        self.alternative_hypothesis = no_alternative();
        self.alternative_confidence = Some(0.0);
    }
}

impl StagePayload for Contradiction {
    const CALL_SITE: &'static str = "staged.contradict";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBuckets {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub supporting: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub contradicting: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub inconclusive: Vec<String>,
}

fn evidence_buckets<'de, D: Deserializer<'de>>(d: D) -> Result<EvidenceBuckets, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(d)?).unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub final_diagnosis: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub causal_chain: String,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub root_cause: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub symptoms: Vec<String>,
    #[serde(default, deserialize_with = "evidence_buckets")]
    pub evidence_summary: EvidenceBuckets,
    #[serde(default, deserialize_with = "lenient::text")]
    pub recommendation: String,
}

impl Confirmation {
    /// Default verdict: the more confident of the two hypotheses, the
    /// incumbent winning ties.
    pub fn fallback(
        incumbent: (&str, f64),
        challenger: (&str, f64),
        supporting: Vec<String>,
    ) -> Self {
        let (diagnosis, _) = if incumbent.1 >= challenger.1 {
            incumbent
        } else {
            challenger
        };
        Self {
            final_diagnosis: Some(diagnosis.to_string()),
            confidence: Some(incumbent.1.max(challenger.1)),
            causal_chain: format!("{diagnosis} leads to observed symptoms"),
            root_cause: Some(diagnosis.to_string()),
            symptoms: Vec::new(),
            evidence_summary: EvidenceBuckets {
                supporting,
                ..EvidenceBuckets::default()
            },
            recommendation: "Further investigation recommended based on available data".into(),
        }
    }
}

impl StagePayload for Confirmation {
    const CALL_SITE: &'static str = "staged.confirm";
}
