//! Feature flattening and date-field coercion.
//!
//! A feature becomes a record by taking its attribute map, adding
//! `Latitude`/`Longitude` when a point geometry is present, and rewriting
//! every date-like attribute from epoch milliseconds to
//! `YYYY-MM-DD HH:MM:SS` (UTC). A value that cannot be coerced is kept as-is.

use crate::error::CoercionError;
use crate::models::{Feature, Geometry, Record};
use chrono::{DateTime, NaiveDateTime};
use serde_json::{Number, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Canonical text form for coerced timestamps.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const LATITUDE_FIELD: &str = "Latitude";
pub const LONGITUDE_FIELD: &str = "Longitude";

/// Decides which attribute keys hold dates.
#[derive(Clone)]
pub enum DateFieldRule {
    /// Key contains the pattern, ignoring case.
    KeyContains(String),
    /// Key is one of the listed names exactly.
    Named(Vec<String>),
    /// Arbitrary predicate over the key.
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl DateFieldRule {
    pub fn key_contains(pattern: impl Into<String>) -> Self {
        DateFieldRule::KeyContains(pattern.into().to_lowercase())
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        DateFieldRule::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            DateFieldRule::KeyContains(pattern) => key.to_lowercase().contains(pattern.as_str()),
            DateFieldRule::Named(names) => names.iter().any(|n| n == key),
            DateFieldRule::Custom(predicate) => predicate(key),
        }
    }
}

impl Default for DateFieldRule {
    fn default() -> Self {
        DateFieldRule::key_contains("date")
    }
}

impl fmt::Debug for DateFieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFieldRule::KeyContains(p) => f.debug_tuple("KeyContains").field(p).finish(),
            DateFieldRule::Named(n) => f.debug_tuple("Named").field(n).finish(),
            DateFieldRule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Turns raw features into normalized records.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    date_rule: DateFieldRule,
}

impl Normalizer {
    pub fn new(date_rule: DateFieldRule) -> Self {
        Self { date_rule }
    }

    /// Flattens geometry into the attributes and coerces date fields.
    pub fn normalize(&self, feature: Feature) -> Record {
        let Feature {
            mut attributes,
            geometry,
        } = feature;

        if let Some(geometry) = geometry {
            flatten_geometry(&mut attributes, geometry);
        }

        self.coerce_dates(&mut attributes);
        attributes
    }

    /// Rewrites every non-null date-like attribute in place.
    pub fn coerce_dates(&self, record: &mut Record) {
        for (key, value) in record.iter_mut() {
            if value.is_null() || !self.date_rule.matches(key) {
                continue;
            }
            if is_canonical(value) {
                continue;
            }

            match coerce_timestamp(value) {
                Ok(text) => *value = Value::String(text),
                Err(e) => warn!(
                    "Conversion failed for {} with value {}: {}. Keeping original value.",
                    key, value, e
                ),
            }
        }
    }
}

/// Adds `Latitude`/`Longitude` from a point geometry.
///
/// An empty geometry adds nothing; a geometry missing one coordinate adds
/// that coordinate as null.
pub fn flatten_geometry(record: &mut Record, geometry: Geometry) {
    if geometry.is_empty() {
        return;
    }
    record.insert(LATITUDE_FIELD.to_string(), coordinate(geometry.y));
    record.insert(LONGITUDE_FIELD.to_string(), coordinate(geometry.x));
}

fn coordinate(value: Option<f64>) -> Value {
    value
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn is_canonical(value: &Value) -> bool {
    match value {
        Value::String(s) => NaiveDateTime::parse_from_str(s, CANONICAL_FORMAT).is_ok(),
        _ => false,
    }
}

/// Interprets a value as epoch milliseconds and formats it canonically.
pub fn coerce_timestamp(value: &Value) -> Result<String, CoercionError> {
    let millis = match value {
        Value::Number(n) => number_to_millis(n)?,
        Value::String(_) => return Err(CoercionError::NotATimestamp("string")),
        Value::Bool(_) => return Err(CoercionError::NotATimestamp("bool")),
        Value::Array(_) => return Err(CoercionError::NotATimestamp("array")),
        Value::Object(_) => return Err(CoercionError::NotATimestamp("object")),
        Value::Null => return Err(CoercionError::NotATimestamp("null")),
    };

    let datetime = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| CoercionError::OutOfRange(millis.to_string()))?;
    debug!("Coerced {} ms to {}", millis, datetime);
    Ok(datetime.format(CANONICAL_FORMAT).to_string())
}

fn number_to_millis(n: &Number) -> Result<i64, CoercionError> {
    if let Some(ms) = n.as_i64() {
        return Ok(ms);
    }
    if n.is_u64() {
        return Err(CoercionError::OutOfRange(n.to_string()));
    }

    let ms = n.as_f64().unwrap_or(f64::NAN).floor();
    if !ms.is_finite() || ms < i64::MIN as f64 || ms >= i64::MAX as f64 {
        return Err(CoercionError::OutOfRange(n.to_string()));
    }
    Ok(ms as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(attributes: Value, geometry: Option<Geometry>) -> Feature {
        Feature {
            attributes: attributes.as_object().cloned().unwrap(),
            geometry,
        }
    }

    #[test]
    fn test_coerce_millis() {
        assert_eq!(
            coerce_timestamp(&json!(1577836800000i64)).unwrap(),
            "2020-01-01 00:00:00"
        );
        assert_eq!(coerce_timestamp(&json!(0)).unwrap(), "1970-01-01 00:00:00");
        assert_eq!(
            coerce_timestamp(&json!(-86400000)).unwrap(),
            "1969-12-31 00:00:00"
        );
    }

    #[test]
    fn test_coerce_fractional_millis_truncates() {
        assert_eq!(
            coerce_timestamp(&json!(1577836800999.7)).unwrap(),
            "2020-01-01 00:00:00"
        );
    }

    #[test]
    fn test_coerce_rejects_wrong_types() {
        assert_eq!(
            coerce_timestamp(&json!("yesterday")),
            Err(CoercionError::NotATimestamp("string"))
        );
        assert_eq!(
            coerce_timestamp(&json!(true)),
            Err(CoercionError::NotATimestamp("bool"))
        );
    }

    #[test]
    fn test_coerce_rejects_out_of_range() {
        assert!(matches!(
            coerce_timestamp(&json!(i64::MAX)),
            Err(CoercionError::OutOfRange(_))
        ));
        assert!(matches!(
            coerce_timestamp(&json!(u64::MAX)),
            Err(CoercionError::OutOfRange(_))
        ));
        assert!(matches!(
            coerce_timestamp(&json!(1e300)),
            Err(CoercionError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_coerce_accepts_dates_past_2262() {
        assert_eq!(
            coerce_timestamp(&json!(10_000_000_000_000i64)).unwrap(),
            "2286-11-20 17:46:40"
        );
        assert_eq!(
            coerce_timestamp(&json!(-10_000_000_000_000i64)).unwrap(),
            "1653-02-10 06:13:20"
        );
    }

    #[test]
    fn test_rule_key_contains_ignores_case() {
        let rule = DateFieldRule::default();
        assert!(rule.matches("ReceivedDate"));
        assert!(rule.matches("DATE_OF_DECISION"));
        assert!(rule.matches("updated"));
        assert!(!rule.matches("Decision"));
    }

    #[test]
    fn test_rule_named_and_custom() {
        let named = DateFieldRule::Named(vec!["when".to_string()]);
        assert!(named.matches("when"));
        assert!(!named.matches("ReceivedDate"));

        let custom = DateFieldRule::custom(|k| k.starts_with("ts_"));
        assert!(custom.matches("ts_opened"));
        assert!(!custom.matches("opened"));
    }

    #[test]
    fn test_normalize_adds_coordinates_and_dates() {
        let normalizer = Normalizer::default();
        let record = normalizer.normalize(feature(
            json!({"ReceivedDate": 1577836800000i64, "Decision": "CONDITIONAL"}),
            Some(Geometry {
                x: Some(-9.05),
                y: Some(53.27),
            }),
        ));

        assert_eq!(record["ReceivedDate"], "2020-01-01 00:00:00");
        assert_eq!(record["Decision"], "CONDITIONAL");
        assert_eq!(record[LATITUDE_FIELD], 53.27);
        assert_eq!(record[LONGITUDE_FIELD], -9.05);
    }

    #[test]
    fn test_normalize_without_geometry() {
        let normalizer = Normalizer::default();
        let record = normalizer.normalize(feature(json!({"ReceivedDate": null}), None));

        assert!(record["ReceivedDate"].is_null());
        assert!(!record.contains_key(LATITUDE_FIELD));
        assert!(!record.contains_key(LONGITUDE_FIELD));
    }

    #[test]
    fn test_empty_geometry_adds_nothing() {
        let normalizer = Normalizer::default();
        let record = normalizer.normalize(feature(json!({}), Some(Geometry::default())));
        assert!(record.is_empty());
    }

    #[test]
    fn test_partial_geometry_adds_null_coordinate() {
        let mut record = Record::new();
        flatten_geometry(
            &mut record,
            Geometry {
                x: Some(1.0),
                y: None,
            },
        );
        assert!(record[LATITUDE_FIELD].is_null());
        assert_eq!(record[LONGITUDE_FIELD], 1.0);
    }

    #[test]
    fn test_failed_coercion_keeps_original() {
        let normalizer = Normalizer::default();
        let record = normalizer.normalize(feature(
            json!({"GrantDate": "not a date", "DecisionDate": 1577836800000i64}),
            None,
        ));

        assert_eq!(record["GrantDate"], "not a date");
        assert_eq!(record["DecisionDate"], "2020-01-01 00:00:00");
    }

    #[test]
    fn test_coercion_is_idempotent() {
        let normalizer = Normalizer::default();
        let mut record = normalizer.normalize(feature(
            json!({"ReceivedDate": 1591000000000i64}),
            None,
        ));
        let first = record.clone();

        normalizer.coerce_dates(&mut record);
        assert_eq!(record, first);
    }

    #[test]
    fn test_injected_rule_controls_coercion() {
        let normalizer = Normalizer::new(DateFieldRule::Named(vec!["opened".to_string()]));
        let record = normalizer.normalize(feature(
            json!({"opened": 0, "ReceivedDate": 0}),
            None,
        ));

        assert_eq!(record["opened"], "1970-01-01 00:00:00");
        assert_eq!(record["ReceivedDate"], 0);
    }
}
