//! Digests: compact, hand-formatted text summaries of context slices.
//!
//! Every function here is total. A missing section yields either nothing or
//! a fixed "not available" line, never an error.

use agrow_core::context::{ContextBundle, is_truthy};
use agrow_core::message::{Role, StoredMessage};
use serde_json::{Map, Value};

use crate::stage::StageName;

/// Qualitative reading of a spectral index value.
pub fn interpret_index(index: &str, value: f64) -> &'static str {
    match index.to_ascii_lowercase().as_str() {
        "ndvi" => match value {
            v if v > 0.7 => "excellent_vegetation",
            v if v > 0.5 => "healthy_vegetation",
            v if v > 0.3 => "moderate_stress",
            v if v > 0.1 => "severe_stress",
            _ => "bare_soil_or_water",
        },
        "ndre" => match value {
            v if v > 0.5 => "high_chlorophyll",
            v if v > 0.3 => "adequate_chlorophyll",
            v if v > 0.1 => "low_chlorophyll",
            _ => "chlorophyll_deficiency",
        },
        "smi" => match value {
            v if v > 0.6 => "adequate_moisture",
            v if v > 0.4 => "moderate_moisture",
            v if v > 0.2 => "low_moisture",
            _ => "critical_moisture_deficit",
        },
        "evi" => match value {
            v if v > 0.5 => "high_biomass",
            v if v > 0.3 => "moderate_biomass",
            _ => "low_biomass",
        },
        "psri" => match value {
            v if v > 0.2 => "senescence_stress",
            v if v > 0.0 => "mild_stress",
            _ => "healthy",
        },
        "pri" => match value {
            v if v > 0.05 => "high_photosynthetic_efficiency",
            v if v > 0.0 => "moderate_efficiency",
            _ => "photosynthetic_stress",
        },
        _ => "unknown",
    }
}

/// A single index value with its interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexReading {
    pub value: f64,
    pub interpretation: String,
}

/// Read an index from `vegetation_indices` (or the top level).
///
/// Entries may be plain numbers or `{current, interpretation}` maps; a
/// missing interpretation is derived from the threshold table.
pub fn index_reading(bundle: &ContextBundle, name: &str) -> Option<IndexReading> {
    let entry = bundle
        .resolve(&format!("vegetation_indices.{name}"))
        .or_else(|| bundle.resolve(name))?;

    let (value, given) = match entry {
        Value::Number(n) => (n.as_f64()?, None),
        Value::Object(map) => (
            map.get("current").and_then(Value::as_f64)?,
            map.get("interpretation")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty()),
        ),
        _ => return None,
    };

    Some(IndexReading {
        value,
        interpretation: given
            .map(str::to_string)
            .unwrap_or_else(|| interpret_index(name, value).to_string()),
    })
}

/// Render a scalar for prose: strings unquoted, missing as `fallback`.
fn plain(value: Option<&Value>, fallback: &str) -> String {
    match value {
        None | Some(Value::Null) => fallback.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn readings(bundle: &ContextBundle, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .filter_map(|name| {
            index_reading(bundle, name)
                .map(|r| format!("{name}:{:.2}({})", r.value, r.interpretation))
        })
        .collect()
}

// ── Fast Lane / Deep Dive ───────────────────────────────────────────────

/// The tier-1-equivalent snapshot used by the single-pass protocol.
pub fn fast_lane_digest(bundle: &ContextBundle) -> String {
    let mut lines = Vec::new();

    let health = readings(bundle, &["NDVI", "NDRE", "EVI"]);
    if !health.is_empty() {
        lines.push(format!("[HEALTH_SIGNALS] {}", health.join(" | ")));
    }

    let water = readings(bundle, &["SMI", "NDWI"]);
    if !water.is_empty() {
        lines.push(format!("[WATER_SIGNALS] {}", water.join(" | ")));
    }

    if bundle.section("weather").is_some_and(|w| !w.is_empty()) {
        let mut line = format!(
            "[WEATHER] {}°C, Rain: {}mm",
            plain(bundle.resolve("weather.current.temp"), "?"),
            plain(bundle.resolve("weather.current.precip"), "?"),
        );
        if let Some(week) = bundle.resolve("weather.rolling_stats.total_precip_7d") {
            line.push_str(&format!(", 7-day rain: {}mm", plain(Some(week), "?")));
        }
        lines.push(line);

        let mut alerts = Vec::new();
        if bundle.flag("weather.stress_indicators.drought_risk") {
            alerts.push("DROUGHT_RISK");
        }
        if bundle.flag("weather.stress_indicators.current_heat_stress") {
            alerts.push("HEAT_STRESS");
        }
        if !alerts.is_empty() {
            lines.push(format!("[ALERTS] {}", alerts.join(", ")));
        }
    }

    if let Some(pct) = bundle.number("stress_analysis.impaired_percentage")
        && pct > 10.0
    {
        lines.push(format!("[PATTERN] {pct:.0}% of field affected. Widespread stress."));
    }

    if lines.is_empty() {
        "No field data available.".into()
    } else {
        lines.join("\n")
    }
}

/// Stage-specific digest for the three-stage protocol.
///
/// Each stage sees the fast-lane snapshot plus data the earlier stages did
/// not: history for the hypothesis, radar and soil lab readings for the
/// adversary, the farmer's profile and recent actions for the judge.
pub fn deep_dive_digest(bundle: &ContextBundle, stage: StageName) -> String {
    let mut lines = vec![fast_lane_digest(bundle)];

    match stage {
        StageName::Hypothesis => {
            if bundle.section("historical_trends").is_some_and(|t| !t.is_empty()) {
                lines.push(format!(
                    "[HISTORY] {}",
                    plain(bundle.resolve("historical_trends.summary"), "")
                ));
            }
        }
        StageName::Adversary => {
            if bundle.section("sar_bands").is_some_and(|s| !s.is_empty()) {
                lines.push(format!(
                    "[SAR_DATA] VV:{} VH:{} Structure:{}",
                    plain(bundle.resolve("sar_bands.vv"), "?"),
                    plain(bundle.resolve("sar_bands.vh"), "?"),
                    plain(bundle.resolve("sar_bands.interpretation"), "stable"),
                ));
            }
            if bundle.section("soil_indicators").is_some_and(|s| !s.is_empty()) {
                lines.push(format!(
                    "[SOIL_LAB] Salinity:{} Organic:{}",
                    plain(bundle.resolve("soil_indicators.salinity.level"), "unknown"),
                    plain(bundle.resolve("soil_indicators.organic_matter.level"), "unknown"),
                ));
            }
        }
        StageName::Judge => {
            if bundle.section("farmer_profile").is_some_and(|f| !f.is_empty()) {
                lines.push(format!(
                    "[FARMER] Goal:{} Budget:{}",
                    plain(bundle.resolve("farmer_profile.farming_goal"), "unknown"),
                    plain(bundle.resolve("farmer_profile.budget_level"), "medium"),
                ));
            }
            if bundle.section("farmer_actions").is_some_and(|a| !a.is_empty()) {
                lines.push(format!(
                    "[ACTIONS] Irrigated:{} days ago. Fertilized:{} days ago.",
                    plain(bundle.resolve("farmer_actions.days_since_irrigation"), "unknown"),
                    plain(bundle.resolve("farmer_actions.days_since_fertilizer"), "unknown"),
                ));
            }
        }
        _ => {}
    }

    lines.join("\n")
}

// ── Tier rendering ──────────────────────────────────────────────────────

fn scalar(value: &Value) -> String {
    match value {
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .map(|f| format!("{f:.4}"))
            .unwrap_or_else(|| n.to_string()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One `**key**: value` line per tier entry. Nested maps are indented.
pub fn tier_digest(tier: &Map<String, Value>) -> String {
    let mut lines = Vec::new();

    for (key, value) in tier {
        match value {
            Value::Null => {}
            Value::Object(inner) => {
                lines.push(format!("**{key}**:"));
                for (k, v) in inner.iter().filter(|(_, v)| !v.is_null()) {
                    lines.push(format!("  - {k}: {}", scalar(v)));
                }
            }
            Value::Array(items) if items.is_empty() => {}
            other => lines.push(format!("**{key}**: {}", scalar(other))),
        }
    }

    if lines.is_empty() {
        "No specific data available.".into()
    } else {
        lines.join("\n")
    }
}

// ── Synthesis digests ───────────────────────────────────────────────────

/// Past week, next three forecast days, and weather stress flags.
pub fn weather_digest(bundle: &ContextBundle) -> String {
    let Some(weather) = bundle.section("weather").filter(|w| !w.is_empty()) else {
        return "No weather data available.".into();
    };
    let mut lines = Vec::new();

    if let Some(stats) = weather.get("rolling_stats").and_then(Value::as_object)
        && !stats.is_empty()
    {
        lines.push("PAST 7 DAYS:".to_string());
        if let Some(t) = stats.get("avg_temp_7d").filter(|v| is_truthy(v)) {
            lines.push(format!("  - Average Max Temp: {}°C", plain(Some(t), "?")));
        }
        let rows = [
            ("total_precip_7d", "Total Rainfall", " mm"),
            ("dry_days_count", "Dry Days", ""),
            ("heat_stress_days", "Heat Stress Days (>35°C)", ""),
        ];
        for (key, label, unit) in rows {
            if let Some(v) = stats.get(key).filter(|v| !v.is_null()) {
                lines.push(format!("  - {label}: {}{unit}", plain(Some(v), "?")));
            }
        }
    }

    if let Some(days) = weather.get("forecast_7d").and_then(Value::as_array)
        && !days.is_empty()
    {
        lines.push("\nNEXT 7 DAYS FORECAST:".to_string());
        for day in days.iter().take(3) {
            lines.push(format!(
                "  - {}: {}°C, Rain: {}mm",
                plain(day.get("date"), "N/A"),
                plain(day.get("temp_max"), "N/A"),
                plain(day.get("precipitation"), "0"),
            ));
        }
    }

    if let Some(stress) = weather.get("stress_indicators").and_then(Value::as_object)
        && !stress.is_empty()
    {
        lines.push("\nWEATHER STRESS INDICATORS:".to_string());
        let flags = [
            ("current_heat_stress", "Current heat stress detected"),
            ("predicted_heat_stress", "Heat stress predicted in next 3 days"),
            ("drought_risk", "Drought risk - low recent and forecast rainfall"),
            ("suitable_for_irrigation", "Good conditions for irrigation"),
            ("suitable_for_spraying", "Good conditions for pesticide/fertilizer application"),
        ];
        for (key, text) in flags {
            if stress.get(key).is_some_and(is_truthy) {
                lines.push(format!("  * {text}"));
            }
        }
    }

    if lines.is_empty() {
        "Weather data not available.".into()
    } else {
        lines.join("\n")
    }
}

/// The three highest-priority stress zones.
pub fn zone_digest(bundle: &ContextBundle) -> String {
    let zones = bundle
        .resolve("zone_analysis.priority_zones")
        .and_then(Value::as_array)
        .filter(|z| !z.is_empty());
    let Some(zones) = zones else {
        return "No zone-specific data available.".into();
    };

    let mut text = String::from("PRIORITY ZONES:");
    for (i, zone) in zones.iter().take(3).enumerate() {
        let stress = zone.get("stress_score").and_then(Value::as_f64).unwrap_or(0.0);
        text.push_str(&format!(
            "\n  {}. {} - Stress: {:.0}%",
            i + 1,
            plain(zone.get("location"), "Zone"),
            stress * 100.0
        ));
    }
    text
}

fn direction(change: f64) -> &'static str {
    if change > 0.0 {
        "up"
    } else if change < 0.0 {
        "down"
    } else {
        "flat"
    }
}

/// Week-over-week index changes and the aggregator's trend summary.
pub fn trend_digest(bundle: &ContextBundle) -> String {
    let mut lines = Vec::new();

    if let Some(change) = bundle.number("historical_trends.changes.ndvi_change_7d") {
        lines.push(format!(
            "NDVI Change (7 days): {} {:.3} ({})",
            direction(change),
            change.abs(),
            plain(bundle.resolve("historical_trends.ndvi_trend"), "unknown")
        ));
    }
    if let Some(change) = bundle.number("historical_trends.changes.smi_change_7d") {
        lines.push(format!(
            "Soil Moisture Change: {} {:.2}",
            direction(change),
            change.abs()
        ));
    }
    if let Some(summary) = bundle
        .text("historical_trends.summary")
        .filter(|s| !s.trim().is_empty())
    {
        lines.push(summary.to_string());
    }

    if lines.is_empty() {
        "No historical trend data available.".into()
    } else {
        lines.join("\n")
    }
}

/// The last three turns of the session, truncated.
pub fn conversation_digest(history: &[StoredMessage]) -> String {
    if history.is_empty() {
        return "This is the first message in the conversation.".into();
    }

    let mut lines = vec!["Recent conversation:".to_string()];
    let start = history.len().saturating_sub(3);
    for message in &history[start..] {
        let (label, limit) = match message.role {
            Role::User => ("User", 150),
            Role::Assistant => ("Assistant", 100),
        };
        let excerpt: String = message.content.chars().take(limit).collect();
        lines.push(format!("  {label}: {excerpt}"));
    }
    lines.join("\n")
}
