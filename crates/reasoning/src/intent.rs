//! Intent classification.
//!
//! Scores a query against static keyword/phrase tables. Each table entry
//! contributes:
//!
//! - +0.15 per keyword found as a substring, +0.05 more if it is a whole word
//! - +0.35 per phrase found as a substring
//! - +0.10 once three or more distinct matches occur
//!
//! A small regional-language table adds +0.3 per hit. Scores are capped at
//! 1.0. A query that matches nothing gets the fixed `general_query` default.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Coarse category of a farmer's question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    VegetationHealth,
    WaterStress,
    NutrientStatus,
    PestDisease,
    ZoneSpecific,
    ForecastQuery,
    ActionRecommendation,
    Comparison,
    FieldComparison,
    GeneralQuery,
}

impl Intent {
    /// Every intent, in table order. Ties in score keep this order.
    pub const ALL: [Intent; 10] = [
        Intent::VegetationHealth,
        Intent::WaterStress,
        Intent::NutrientStatus,
        Intent::PestDisease,
        Intent::ZoneSpecific,
        Intent::ForecastQuery,
        Intent::ActionRecommendation,
        Intent::Comparison,
        Intent::FieldComparison,
        Intent::GeneralQuery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::VegetationHealth => "vegetation_health",
            Intent::WaterStress => "water_stress",
            Intent::NutrientStatus => "nutrient_status",
            Intent::PestDisease => "pest_disease",
            Intent::ZoneSpecific => "zone_specific",
            Intent::ForecastQuery => "forecast_query",
            Intent::ActionRecommendation => "action_recommendation",
            Intent::Comparison => "comparison",
            Intent::FieldComparison => "field_comparison",
            Intent::GeneralQuery => "general_query",
        }
    }

    /// Declared base priority (lower is more specific).
    pub fn base_priority(&self) -> u8 {
        pattern_for(*self).priority
    }

    /// Whether this intent asks to compare things.
    pub fn is_comparative(&self) -> bool {
        matches!(self, Intent::Comparison | Intent::FieldComparison)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown intent: {0}")]
pub struct UnknownIntent(pub String);

impl FromStr for Intent {
    type Err = UnknownIntent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::ALL
            .into_iter()
            .find(|intent| intent.as_str() == s.trim())
            .ok_or_else(|| UnknownIntent(s.to_string()))
    }
}

/// The classifier's verdict for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub primary_intent: Intent,
    pub sub_intents: Vec<String>,
    /// In `[0, 1]`, rounded to two decimals.
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
    /// Top three `(intent, score)` pairs, best first.
    pub all_intents: Vec<(Intent, f64)>,
}

impl IntentResult {
    /// The fixed answer for queries nothing matches.
    pub fn general_default() -> Self {
        Self {
            primary_intent: Intent::GeneralQuery,
            sub_intents: vec!["general_info".into()],
            confidence: 0.4,
            matched_keywords: Vec::new(),
            all_intents: vec![(Intent::GeneralQuery, 0.4)],
        }
    }
}

// ── Static tables ───────────────────────────────────────────────────────

struct IntentPattern {
    intent: Intent,
    keywords: &'static [&'static str],
    phrases: &'static [&'static str],
    sub_intents: &'static [&'static str],
    priority: u8,
}

static PATTERNS: [IntentPattern; 10] = [
    IntentPattern {
        intent: Intent::VegetationHealth,
        keywords: &[
            "yellow", "yellowing", "brown", "browning", "dying", "wilting", "healthy", "health",
            "crop health", "plant health", "leaf", "leaves", "chlorophyll", "green", "greenness",
            "stunted", "weak", "pale", "ndvi", "evi", "vegetation", "biomass", "vigor", "canopy",
        ],
        phrases: &[
            "why is my crop",
            "is my crop healthy",
            "crop looks",
            "plants look",
            "leaves turning",
            "plant dying",
        ],
        sub_intents: &["chlorophyll_issue", "nutrient_deficiency", "general_health"],
        priority: 1,
    },
    IntentPattern {
        intent: Intent::WaterStress,
        keywords: &[
            "water", "irrigation", "irrigate", "dry", "drought", "moisture", "thirsty", "watering",
            "rain", "wet", "smi", "ndwi", "soil moisture", "dehydrated", "wilt", "drooping",
            "crispy", "parched",
        ],
        phrases: &[
            "need water",
            "should i water",
            "need irrigation",
            "drought stress",
            "when to irrigate",
            "soil is dry",
            "field is dry",
            "too dry",
            "field too dry",
        ],
        sub_intents: &["drought_stress", "overwatering", "irrigation_timing"],
        priority: 2,
    },
    IntentPattern {
        intent: Intent::NutrientStatus,
        keywords: &[
            "fertilizer", "nutrient", "nitrogen", "phosphorus", "potassium", "npk", "deficiency",
            "feeding", "feed", "ndre", "reci", "mcari", "urea", "dap", "mop", "manure", "compost",
            "micronutrient",
        ],
        phrases: &[
            "need fertilizer",
            "nutrient deficiency",
            "should i fertilize",
            "lacking nutrients",
            "nitrogen deficiency",
            "fertilizer amount",
        ],
        sub_intents: &["nitrogen_deficiency", "nutrient_excess", "fertilizer_timing"],
        priority: 3,
    },
    IntentPattern {
        intent: Intent::PestDisease,
        keywords: &[
            "pest", "disease", "insect", "bug", "infection", "fungus", "blight", "rot", "spots",
            "holes", "eating", "aphid", "borer", "rust", "mildew", "virus", "bacteria",
            "infestation", "damage",
        ],
        phrases: &[
            "pest attack",
            "disease problem",
            "insect damage",
            "fungal infection",
            "what is eating",
            "spots on leaves",
            "pest risk",
        ],
        sub_intents: &["pest_damage", "fungal_disease", "bacterial_issue", "viral_disease"],
        priority: 4,
    },
    IntentPattern {
        intent: Intent::ZoneSpecific,
        keywords: &[
            "area", "zone", "patch", "section", "part", "corner", "side", "northeast", "northwest",
            "southeast", "southwest", "north", "south", "east", "west", "center", "edge",
            "boundary", "specific",
        ],
        phrases: &[
            "which area",
            "which zone",
            "which part",
            "where is the problem",
            "affected area",
            "problem zone",
            "specific area",
        ],
        sub_intents: &["zone_diagnosis", "zone_comparison", "spatial_query"],
        priority: 5,
    },
    IntentPattern {
        intent: Intent::ForecastQuery,
        keywords: &[
            "forecast", "predict", "prediction", "future", "next week", "tomorrow", "will",
            "expect", "trend", "coming days", "upcoming", "projection", "growth", "yield",
            "estimate", "outlook",
        ],
        phrases: &[
            "what will happen",
            "next week",
            "in the future",
            "will my crop",
            "expected yield",
            "growth forecast",
            "weather forecast",
        ],
        sub_intents: &[
            "growth_forecast",
            "stress_prediction",
            "weather_impact",
            "yield_forecast",
        ],
        priority: 6,
    },
    IntentPattern {
        intent: Intent::ActionRecommendation,
        keywords: &[
            "what should", "how to", "fix", "solve", "recommend", "advice", "help", "do",
            "action", "steps", "treatment", "remedy", "solution", "best practice", "suggestion",
            "improve",
        ],
        phrases: &[
            "what should i do",
            "how do i fix",
            "how to solve",
            "recommend",
            "give me advice",
            "best action",
            "immediate action",
        ],
        sub_intents: &["immediate_action", "long_term_plan", "preventive_action"],
        priority: 7,
    },
    IntentPattern {
        intent: Intent::Comparison,
        keywords: &[
            "compare", "comparison", "better", "worse", "change", "changed", "difference",
            "last week", "before", "improvement", "decline", "progress", "regression",
            "historical", "trend",
        ],
        phrases: &[
            "compared to",
            "better than",
            "worse than",
            "has it improved",
            "how has it changed",
            "over time",
            "last month",
        ],
        sub_intents: &["temporal_comparison", "zone_comparison", "historical_analysis"],
        priority: 8,
    },
    IntentPattern {
        intent: Intent::FieldComparison,
        keywords: &[
            "compare", "comparison", "versus", " vs ", "other field", "another field",
            "between fields", "both fields", "which field", "differ", "different field",
            "my other", "second field", "first field",
        ],
        phrases: &[
            "compare with",
            "compared to my",
            "how does my * compare",
            "between my fields",
            "which field is better",
            "difference between",
            "compare * and *",
            "other farm",
            "other farmland",
            "another farm",
        ],
        sub_intents: &["multi_field_analysis", "field_ranking", "relative_health"],
        priority: 2,
    },
    IntentPattern {
        intent: Intent::GeneralQuery,
        keywords: &[
            "what", "how", "why", "tell", "about", "explain", "hello", "hi", "information",
            "details", "overview", "status", "summary",
        ],
        phrases: &["tell me about", "what is", "how does", "explain"],
        sub_intents: &["general_info"],
        priority: 9,
    },
];

/// Regional-language keywords, matched against the query as typed.
static REGIONAL: [(Intent, &[&str]); 4] = [
    (Intent::VegetationHealth, &["पीला", "पत्ते", "सूखा", "मुरझाना"]),
    (Intent::WaterStress, &["पानी", "सिंचाई", "सूखा"]),
    (Intent::NutrientStatus, &["खाद", "यूरिया", "उर्वरक"]),
    (Intent::PestDisease, &["कीट", "रोग", "कीड़ा"]),
];

const KEYWORD_HIT: f64 = 0.15;
const WHOLE_WORD_BONUS: f64 = 0.05;
const PHRASE_HIT: f64 = 0.35;
const MULTI_MATCH_BONUS: f64 = 0.1;
const REGIONAL_HIT: f64 = 0.3;

fn pattern_for(intent: Intent) -> &'static IntentPattern {
    // PATTERNS is declared in the same order as Intent::ALL.
    &PATTERNS[Intent::ALL
        .iter()
        .position(|i| *i == intent)
        .unwrap_or(PATTERNS.len() - 1)]
}

/// Whole-word matchers, one per keyword per pattern.
static WORD_MATCHERS: LazyLock<Vec<Vec<Option<Regex>>>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|p| {
            p.keywords
                .iter()
                .map(|kw| Regex::new(&format!(r"\b{}\b", regex_lite::escape(kw))).ok())
                .collect()
        })
        .collect()
});

// ── Classification ──────────────────────────────────────────────────────

/// Classify a query. Pure function of the query and the static tables.
pub fn classify(query: &str) -> IntentResult {
    let lowered = query.to_lowercase();
    let mut scored: Vec<(Intent, f64, Vec<String>)> = Vec::new();

    for (index, pattern) in PATTERNS.iter().enumerate() {
        let (mut score, mut matches) = score_pattern(&lowered, index, pattern);

        if let Some((_, words)) = REGIONAL.iter().find(|(i, _)| *i == pattern.intent) {
            for word in words.iter().filter(|w| query.contains(**w)) {
                score += REGIONAL_HIT;
                matches.push((*word).to_string());
            }
        }

        if score > 0.0 {
            scored.push((pattern.intent, score.min(1.0), matches));
        }
    }

    if scored.is_empty() {
        return IntentResult::general_default();
    }

    // Stable sort: equal scores keep table order.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (primary, confidence, matched) = scored[0].clone();
    IntentResult {
        primary_intent: primary,
        sub_intents: detect_sub_intents(&lowered, primary),
        confidence: round2(confidence),
        matched_keywords: matched,
        all_intents: scored
            .iter()
            .take(3)
            .map(|(intent, score, _)| (*intent, round2(*score)))
            .collect(),
    }
}

fn score_pattern(query: &str, index: usize, pattern: &IntentPattern) -> (f64, Vec<String>) {
    let mut score = 0.0;
    let mut matches = Vec::new();
    let matchers = WORD_MATCHERS.get(index);

    for (k, keyword) in pattern.keywords.iter().enumerate() {
        if !query.contains(keyword) {
            continue;
        }
        score += KEYWORD_HIT;
        matches.push((*keyword).to_string());

        let whole_word = matchers
            .and_then(|m| m.get(k))
            .and_then(Option::as_ref)
            .is_some_and(|re| re.is_match(query));
        if whole_word {
            score += WHOLE_WORD_BONUS;
        }
    }

    for phrase in pattern.phrases.iter().filter(|p| query.contains(**p)) {
        score += PHRASE_HIT;
        matches.push((*phrase).to_string());
    }

    if matches.len() >= 3 {
        score += MULTI_MATCH_BONUS;
    }

    (score, matches)
}

fn detect_sub_intents(query: &str, primary: Intent) -> Vec<String> {
    let mut subs: Vec<String> = pattern_for(primary)
        .sub_intents
        .first()
        .map(|s| vec![(*s).to_string()])
        .unwrap_or_default();

    let cues: [(&[&str], &str); 6] = [
        (&["why"], "causal_analysis"),
        (&["how much", "how many", "quantity"], "quantitative"),
        (&["when"], "temporal"),
        (&["where"], "spatial"),
        (&["should", "recommend"], "recommendation_needed"),
        (&["urgent", "immediately", "emergency"], "urgent"),
    ];
    for (needles, label) in cues {
        if needles.iter().any(|n| query.contains(n)) {
            subs.push(label.to_string());
        }
    }

    if subs.is_empty() {
        subs.push("general".into());
    }
    subs
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ── Entity and comparison detection ─────────────────────────────────────

const ORDINALS: [(&str, usize); 12] = [
    ("first", 0),
    ("1st", 0),
    ("field 1", 0),
    ("field one", 0),
    ("second", 1),
    ("2nd", 1),
    ("field 2", 1),
    ("field two", 1),
    ("third", 2),
    ("3rd", 2),
    ("field 3", 2),
    ("field three", 2),
];

const CROSS_ENTITY_PHRASES: [&str; 6] = [
    "other field",
    "another field",
    "other farm",
    "another farm",
    "my other",
    "between fields",
];

const COMPARISON_CUES: [&str; 10] = [
    "compare",
    "difference",
    "versus",
    " vs ",
    "worse than",
    "better than",
    "compared to",
    "last week",
    "last month",
    "than before",
];

/// Known entity names (fields, farms) mentioned in the query, in table
/// order, followed by ordinal references such as "second field".
pub fn extract_entity_names(query: &str, known_names: &[String]) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut detected: Vec<String> = known_names
        .iter()
        .filter(|name| !name.is_empty() && lowered.contains(&name.to_lowercase()))
        .cloned()
        .collect();

    for (pattern, index) in ORDINALS {
        if !lowered.contains(pattern) {
            continue;
        }
        if let Some(name) = known_names.get(index)
            && !detected.contains(name)
        {
            detected.push(name.clone());
        }
    }

    detected
}

/// Whether the query compares entities or points in time.
pub fn is_comparison_query(query: &str, known_names: &[String]) -> bool {
    is_comparison_for(query, classify(query).primary_intent, known_names)
}

/// [`is_comparison_query`] with an already-classified primary intent.
pub fn is_comparison_for(query: &str, primary: Intent, known_names: &[String]) -> bool {
    let lowered = query.to_lowercase();
    let mentioned = extract_entity_names(query, known_names);

    if mentioned.len() >= 2 {
        return true;
    }

    if primary.is_comparative()
        && (!mentioned.is_empty() || CROSS_ENTITY_PHRASES.iter().any(|p| lowered.contains(p)))
    {
        return true;
    }

    COMPARISON_CUES.iter().any(|cue| lowered.contains(cue))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn too_dry_is_confident_water_stress() {
        let result = classify("Is my field too dry?");
        assert_eq!(result.primary_intent, Intent::WaterStress);
        assert!(result.confidence > 0.7, "confidence {}", result.confidence);
        assert!(result.matched_keywords.contains(&"too dry".to_string()));
    }

    #[test]
    fn yellowing_with_worse_than_last_week_is_comparison() {
        let q = "Why are my leaves yellowing and is it worse than last week?";
        let result = classify(q);
        assert_eq!(result.primary_intent, Intent::Comparison);
        assert_eq!(result.confidence, 0.85);
        assert!(result.sub_intents.contains(&"causal_analysis".to_string()));
        assert_eq!(result.all_intents.len(), 3);
        assert_eq!(result.all_intents[1].0, Intent::VegetationHealth);
        assert!(is_comparison_query(q, &[]));
    }

    #[test]
    fn unmatched_query_gets_default() {
        let result = classify("zzz qqq");
        assert_eq!(result, IntentResult::general_default());
    }

    #[test]
    fn whole_word_bonus_applies_only_to_words() {
        // "yellow" appears only inside "yellowing": 0.15, "yellowing": 0.2
        let result = classify("yellowing");
        assert_eq!(result.primary_intent, Intent::VegetationHealth);
        assert_eq!(result.confidence, 0.35);
    }

    #[test]
    fn regional_keywords_score() {
        let result = classify("मेरे खेत में खाद कब डालूं");
        assert_eq!(result.primary_intent, Intent::NutrientStatus);
        assert_eq!(result.confidence, 0.3);
    }

    #[test]
    fn confidence_stays_in_unit_interval() {
        let queries = [
            "",
            "water water irrigation drought dry moisture need water too dry field too dry",
            "Should I irrigate urgently? When? Where? How much?",
            "compare my first field versus the second field, which field is better",
            "पानी सिंचाई सूखा पीला पत्ते",
        ];
        for q in queries {
            let result = classify(q);
            assert!((0.0..=1.0).contains(&result.confidence), "{q}: {}", result.confidence);
            assert!(Intent::ALL.contains(&result.primary_intent));
            for (_, score) in &result.all_intents {
                assert!((0.0..=1.0).contains(score));
            }
        }
    }

    #[test]
    fn sub_intent_cues_accumulate() {
        let result = classify("When should I irrigate, it is urgent");
        assert_eq!(result.primary_intent, Intent::WaterStress);
        assert_eq!(result.sub_intents[0], "drought_stress");
        assert!(result.sub_intents.contains(&"temporal".to_string()));
        assert!(result.sub_intents.contains(&"recommendation_needed".to_string()));
        assert!(result.sub_intents.contains(&"urgent".to_string()));
    }

    #[test]
    fn intent_names_roundtrip() {
        for intent in Intent::ALL {
            assert_eq!(intent.as_str().parse::<Intent>().unwrap(), intent);
        }
        assert!("drainage".parse::<Intent>().is_err());
        assert_eq!(Intent::FieldComparison.base_priority(), 2);
    }

    #[test]
    fn entity_names_by_substring_and_ordinal() {
        let known = names(&["North Plot", "River Farm", "Hill Field"]);
        let found = extract_entity_names("How is river farm compared to the first field?", &known);
        assert_eq!(found, names(&["River Farm", "North Plot"]));
        assert!(extract_entity_names("anything", &[]).is_empty());
    }

    #[test]
    fn ordinal_beyond_known_names_is_ignored() {
        let known = names(&["Only Plot"]);
        assert!(extract_entity_names("third field please", &known).is_empty());
    }

    #[test]
    fn comparison_detection() {
        let known = names(&["North Plot", "River Farm"]);
        assert!(is_comparison_query("north plot and river farm status", &known));
        assert!(is_comparison_query("which field is better, my other one?", &known));
        assert!(is_comparison_query("difference in moisture", &known));
        assert!(!is_comparison_query("Is my field too dry?", &known));
        assert!(!is_comparison_query("How is North Plot doing?", &known));
    }
}
