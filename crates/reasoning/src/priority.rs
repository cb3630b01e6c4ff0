//! Priority context mapping.
//!
//! Projects a context bundle into four ordered tiers for a given intent.
//! Each tier is an independent slice: a static table lists the dotted paths
//! each tier wants, and only paths that resolve in the bundle are kept.
//! Result keys are the last segment of each path; a later path with the
//! same last segment replaces an earlier one.

use agrow_core::context::{ContextBundle, resolve_in};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::intent::Intent;

/// One tier of projected context.
pub type Tier = Map<String, Value>;

/// Four ordered, independent slices of the bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorityTiers {
    tiers: [Tier; 4],
}

/// The keys each tier exposed, for traces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierKeys {
    pub priority_1: Vec<String>,
    pub priority_2: Vec<String>,
    pub priority_3: Vec<String>,
    pub priority_4: Vec<String>,
}

impl PriorityTiers {
    pub fn new(tiers: [Tier; 4]) -> Self {
        Self { tiers }
    }

    /// Tier by 1-based level. Levels outside 1..=4 yield `None`.
    pub fn tier(&self, level: usize) -> Option<&Tier> {
        level.checked_sub(1).and_then(|i| self.tiers.get(i))
    }

    /// Keys of a tier by 1-based level.
    pub fn keys(&self, level: usize) -> Vec<String> {
        self.tier(level)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(Map::is_empty)
    }

    pub fn exposed_keys(&self) -> TierKeys {
        TierKeys {
            priority_1: self.keys(1),
            priority_2: self.keys(2),
            priority_3: self.keys(3),
            priority_4: self.keys(4),
        }
    }
}

// ── Per-intent table ────────────────────────────────────────────────────

type TierPaths = [&'static [&'static str]; 4];

const VEGETATION_HEALTH: TierPaths = [
    &["NDVI", "EVI", "NDRE", "RECI", "temporal_trends.NDVI"],
    &["clustering.stressed_patches", "anomalies", "PSRI", "PRI"],
    &["weather.temperature", "SMI", "B05", "B08", "weather.heat_stress"],
    &["SAR.VV", "SAR.VH", "previous_analysis", "farmer_actions"],
];

const WATER_STRESS: TierPaths = [
    &["SMI", "NDWI", "SAR.VV", "SAR.VH", "soil_indicators.moisture"],
    &["temporal_trends.SMI", "weather.precipitation", "weather.evapotranspiration"],
    &["NDVI", "clustering.moisture_clusters", "B11", "B12", "sentinel2_bands.B11"],
    &["farmer_actions.irrigation", "forecast.rain", "previous_analysis"],
];

const NUTRIENT_STATUS: TierPaths = [
    &["NDRE", "RECI", "MCARI", "B05", "B06", "B07", "sentinel2_bands.B05"],
    &["NDVI", "EVI", "temporal_trends.NDRE"],
    &["SMI", "SFI", "SOMI", "clustering.nutrient_clusters", "soil_indicators.fertility"],
    &["farmer_actions.fertilizer", "weather", "previous_analysis"],
];

const PEST_DISEASE: TierPaths = [
    &["anomalies", "PSRI", "PRI", "spatial_patterns.hotspots", "clustering.outliers"],
    &["NDVI", "temporal_trends.sudden_changes", "clustering.stressed_patches"],
    &["weather.humidity", "weather.temperature", "B04", "B05"],
    &["farmer_actions.spraying", "previous_analysis", "historical_issues"],
];

const ZONE_SPECIFIC: TierPaths = [
    &["clustering.zone_stats", "patch_assignments", "spatial_embeddings", "clustering.clusters"],
    &["anomalies.in_zone", "vegetation_indices", "all_indices.zone_values"],
    &["temporal_trends.zone_specific", "temporal_trends"],
    &["previous_analysis.zone_notes", "farmer_actions.zone_specific"],
];

const FORECAST_QUERY: TierPaths = [
    &["forecast.predictions", "temporal_trends", "weather.forecast", "weather_data"],
    &["NDVI", "SMI", "current_stress_level", "health_summary"],
    &["historical_patterns", "growth_stage", "clustering"],
    &["farmer_actions.planned", "previous_analysis"],
];

const ACTION_RECOMMENDATION: TierPaths = [
    &["health_summary", "NDVI", "SMI", "anomalies", "stressed_patches"],
    &["weather", "weather.forecast", "clustering.priority_zones"],
    &["temporal_trends", "soil_indicators"],
    &["farmer_actions", "previous_analysis", "recommendations_history"],
];

const COMPARISON: TierPaths = [
    &["temporal_trends", "historical.NDVI", "historical.SMI"],
    &["change_detection", "improvement_metrics"],
    &["weather.historical", "farmer_actions.historical"],
    &["previous_analysis", "baseline_values"],
];

const GENERAL_QUERY: TierPaths = [
    &["NDVI", "health_summary", "weather", "field_info"],
    &["SMI", "anomalies", "clustering.summary", "vegetation_indices"],
    &["temporal_trends", "forecast", "soil_indicators"],
    &["farmer_actions", "previous_analysis"],
];

/// Index names copied from `vegetation_indices` into tier 1 when absent.
pub const TIER1_INDEX_INJECTIONS: [&str; 5] = ["NDVI", "EVI", "NDRE", "SMI", "NDWI"];

/// `field_info` entries always copied into tier 1 when present.
pub const TIER1_FIELD_INJECTIONS: [&str; 2] = ["crop_type", "area_acres"];

/// The four path lists for an intent. `field_comparison` shares the
/// general table.
pub fn table_for(intent: Intent) -> &'static TierPaths {
    match intent {
        Intent::VegetationHealth => &VEGETATION_HEALTH,
        Intent::WaterStress => &WATER_STRESS,
        Intent::NutrientStatus => &NUTRIENT_STATUS,
        Intent::PestDisease => &PEST_DISEASE,
        Intent::ZoneSpecific => &ZONE_SPECIFIC,
        Intent::ForecastQuery => &FORECAST_QUERY,
        Intent::ActionRecommendation => &ACTION_RECOMMENDATION,
        Intent::Comparison => &COMPARISON,
        Intent::FieldComparison | Intent::GeneralQuery => &GENERAL_QUERY,
    }
}

// ── Projection ──────────────────────────────────────────────────────────

/// Project the bundle into the intent's four tiers. Unresolved paths are
/// omitted.
pub fn get_tiers(intent: Intent, bundle: &ContextBundle) -> PriorityTiers {
    let table = table_for(intent);
    PriorityTiers::new(table.map(|paths| extract(bundle.as_map(), paths)))
}

fn extract(root: &Map<String, Value>, paths: &[&str]) -> Tier {
    let mut tier = Tier::new();
    for &path in paths {
        if let Some(value) = resolve_in(root, path) {
            let key = path.rsplit('.').next().unwrap_or(path);
            tier.insert(key.to_string(), value.clone());
        }
    }
    tier
}

/// [`get_tiers`] plus the always-available anchors.
///
/// Tier 1 gains the headline indices from `vegetation_indices` (when not
/// already present) and the crop type and field size. Tier 4 gains the
/// SAR band summary plus whatever farmer actions and previous analysis the
/// bundle carries. Nothing absent from the bundle is injected.
pub fn build_staged_context(intent: Intent, bundle: &ContextBundle) -> PriorityTiers {
    let mut tiers = get_tiers(intent, bundle);

    if let Some(indices) = bundle.section("vegetation_indices") {
        let claim = &mut tiers.tiers[0];
        for name in TIER1_INDEX_INJECTIONS {
            if claim.contains_key(name) {
                continue;
            }
            if let Some(value) = resolve_in(indices, name) {
                claim.insert(name.to_string(), value.clone());
            }
        }
    }

    if let Some(field) = bundle.section("field_info") {
        let claim = &mut tiers.tiers[0];
        for name in TIER1_FIELD_INJECTIONS {
            if let Some(value) = field.get(name).filter(|v| !v.is_null()) {
                claim.insert(name.to_string(), value.clone());
            }
        }
    }

    let confirm = &mut tiers.tiers[3];
    if let Some(sar) = bundle.get("sar_bands").filter(|v| is_present(v))
        && !confirm.contains_key("VV")
    {
        confirm.insert("SAR".into(), sar.clone());
    }
    for key in ["farmer_actions", "previous_analysis"] {
        if let Some(value) = bundle.get(key).filter(|v| is_present(v)) {
            confirm.insert(key.into(), value.clone());
        }
    }

    tiers
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Null => false,
        _ => true,
    }
}
