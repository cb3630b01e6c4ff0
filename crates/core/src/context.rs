//! Context bundle: the open-world, read-only snapshot of everything the
//! upstream aggregator knows about a field.
//!
//! The bundle is a nested JSON object. Any key may be absent, so every accessor
//! returns an `Option` and a missing path is never an error. Paths are dotted
//! (`weather.stress_indicators.drought_risk`); each segment is matched exactly
//! first, then upper-cased, then lower-cased, because upstream producers are
//! inconsistent about index casing (`NDVI` vs `ndvi`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ContextError;

/// The nested context map supplied per query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextBundle(Map<String, Value>);

impl ContextBundle {
    /// An empty bundle. Every lookup misses.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a bundle from an arbitrary JSON value; only objects are accepted.
    pub fn from_value(value: Value) -> Result<Self, ContextError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(ContextError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Builder-style insert of a top-level key.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Top-level keys in the bundle.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Exact top-level lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// A top-level object section, e.g. `weather`.
    pub fn section(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }

    /// Resolve a dotted path with per-segment case fallback.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        resolve_in(&self.0, path)
    }

    /// Resolve a path to a number.
    pub fn number(&self, path: &str) -> Option<f64> {
        self.resolve(path).and_then(Value::as_f64)
    }

    /// Resolve a path to a string.
    pub fn text(&self, path: &str) -> Option<&str> {
        self.resolve(path).and_then(Value::as_str)
    }

    /// Resolve a path to a truthy flag. Missing means false.
    pub fn flag(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(is_truthy)
    }

    /// Resolve a path to a list of strings, skipping non-string entries.
    pub fn strings(&self, path: &str) -> Vec<String> {
        self.resolve(path)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl From<Map<String, Value>> for ContextBundle {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Resolve a dotted path against any JSON object.
///
/// Returns `None` for a missing segment, a non-object intermediate, or a
/// terminal `null`.
pub fn resolve_in<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }

    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = lookup_segment(root, first)?;

    for segment in segments {
        let object = current.as_object()?;
        current = lookup_segment(object, segment)?;
    }

    (!current.is_null()).then_some(current)
}

fn lookup_segment<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object
        .get(key)
        .or_else(|| object.get(&key.to_uppercase()))
        .or_else(|| object.get(&key.to_lowercase()))
}

/// Loose truthiness for upstream flags, which arrive as bools, 0/1 or strings.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Aggregator seam ──────────────────────────────────────────────────────

/// Which field's context to fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
}

/// The upstream context aggregator.
///
/// Called once per query before the pipeline runs. A partial bundle is a
/// normal answer; only a transport-level failure is an error.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// A human-readable name for logs.
    fn name(&self) -> &str;

    /// Fetch the bundle for one field.
    async fn fetch(&self, request: &ContextRequest) -> Result<ContextBundle, ContextError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle() -> ContextBundle {
        ContextBundle::from_value(json!({
            "vegetation_indices": {
                "NDVI": {"current": 0.42, "interpretation": "moderate_stress"},
                "smi": 0.15
            },
            "weather": {
                "current": {"temp": 34.5, "precip": 0.0},
                "stress_indicators": {"drought_risk": true, "current_heat_stress": 0}
            },
            "SAR": {"VV": -11.2},
            "previous_analysis": null
        }))
        .unwrap()
    }

    #[test]
    fn resolves_exact_paths() {
        let b = bundle();
        assert_eq!(b.number("weather.current.temp"), Some(34.5));
        assert!(b.flag("weather.stress_indicators.drought_risk"));
    }

    #[test]
    fn resolves_with_case_fallback_per_segment() {
        let b = bundle();
        // lower-case request, upper-case key
        assert_eq!(b.number("vegetation_indices.ndvi.current"), Some(0.42));
        // upper-case request, lower-case key
        assert_eq!(b.number("vegetation_indices.SMI"), Some(0.15));
        assert_eq!(b.number("sar.vv"), Some(-11.2));
    }

    #[test]
    fn missing_paths_are_none_not_errors() {
        let b = bundle();
        assert!(b.resolve("weather.forecast.rain").is_none());
        assert!(b.resolve("vegetation_indices.NDVI.current.deeper").is_none());
        assert!(b.resolve("").is_none());
        assert!(!b.flag("weather.stress_indicators.current_heat_stress"));
    }

    #[test]
    fn null_values_count_as_missing() {
        let b = bundle();
        assert!(b.get("previous_analysis").is_none());
        assert!(b.resolve("previous_analysis").is_none());
    }

    #[test]
    fn non_object_payload_rejected() {
        assert!(ContextBundle::from_value(json!([1, 2, 3])).is_err());
        assert!(ContextBundle::from_value(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn strings_skips_non_string_entries() {
        let b = ContextBundle::new().with(
            "persona",
            json!({"all_fields": ["North Plot", 7, "River Field"]}),
        );
        assert_eq!(b.strings("persona.all_fields"), vec!["North Plot", "River Field"]);
        assert!(b.strings("persona.missing").is_empty());
    }
}
