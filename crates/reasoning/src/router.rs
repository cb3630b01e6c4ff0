//! Routing: choose Fast Lane or Deep Dive once per query.
//!
//! Fast Lane only when the primary intent is one of the simple intents, its
//! confidence is above the threshold, and the query is not a comparison.
//! Everything else takes the Deep Dive.

use agrow_config::RoutingConfig;
use agrow_core::provider::TextCompleter;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::intent::{Intent, IntentResult, UnknownIntent, is_comparison_for};
use crate::protocol::{AdversarialDeepDive, FastLane, ReasoningProtocol, StagedDeepDive};
use crate::stage::RoutingMode;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error(transparent)]
    UnknownIntent(#[from] UnknownIntent),

    #[error("Unknown deep dive protocol '{0}'")]
    UnknownProtocol(String),

    #[error("Fast lane threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
}

/// The routing rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingPolicy {
    threshold: f64,
    simple_intents: Vec<Intent>,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            simple_intents: vec![
                Intent::VegetationHealth,
                Intent::WaterStress,
                Intent::NutrientStatus,
            ],
        }
    }
}

impl RoutingPolicy {
    pub fn new(threshold: f64, simple_intents: Vec<Intent>) -> Result<Self, RoutingError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(RoutingError::InvalidThreshold(threshold));
        }
        Ok(Self {
            threshold,
            simple_intents,
        })
    }

    pub fn from_config(config: &RoutingConfig) -> Result<Self, RoutingError> {
        let simple_intents = config
            .simple_intents
            .iter()
            .map(|name| name.parse::<Intent>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(config.fast_lane_threshold, simple_intents)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn simple_intents(&self) -> &[Intent] {
        &self.simple_intents
    }

    /// Decide the path for one classified query.
    pub fn route(&self, query: &str, intent: &IntentResult, known_names: &[String]) -> RoutingMode {
        let simple = self.simple_intents.contains(&intent.primary_intent);
        let confident = intent.confidence > self.threshold;
        let comparison = is_comparison_for(query, intent.primary_intent, known_names);

        let mode = if simple && confident && !comparison {
            RoutingMode::FastLane
        } else {
            RoutingMode::DeepDive
        };
        debug!(
            intent = %intent.primary_intent,
            confidence = intent.confidence,
            simple,
            comparison,
            mode = %mode,
            "Routed query"
        );
        mode
    }
}

/// The two protocols a router can hand out.
pub struct ProtocolSet {
    fast_lane: Arc<dyn ReasoningProtocol>,
    deep_dive: Arc<dyn ReasoningProtocol>,
}

impl ProtocolSet {
    pub fn new(
        fast_lane: Arc<dyn ReasoningProtocol>,
        deep_dive: Arc<dyn ReasoningProtocol>,
    ) -> Self {
        Self {
            fast_lane,
            deep_dive,
        }
    }

    /// Build both protocols over one completer, picking the Deep Dive by name.
    pub fn with_deep_dive(
        completer: Arc<dyn TextCompleter>,
        deep_dive: &str,
    ) -> Result<Self, RoutingError> {
        let deep: Arc<dyn ReasoningProtocol> = match deep_dive {
            "adversarial" => Arc::new(AdversarialDeepDive::new(completer.clone())),
            "staged" => Arc::new(StagedDeepDive::new(completer.clone())),
            other => return Err(RoutingError::UnknownProtocol(other.to_string())),
        };
        Ok(Self::new(Arc::new(FastLane::new(completer)), deep))
    }

    pub fn for_mode(&self, mode: RoutingMode) -> &dyn ReasoningProtocol {
        match mode {
            RoutingMode::FastLane => self.fast_lane.as_ref(),
            RoutingMode::DeepDive => self.deep_dive.as_ref(),
        }
    }
}
