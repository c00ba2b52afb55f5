//! Data models for planning-application retrieval.
//!
//! This module contains the wire shapes decoded from the feature service,
//! the normalized record table built from them, and the yearly statistics
//! derived from that table.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// A single record: field name to value.
pub type Record = Map<String, Value>;

/// Point location attached to a feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Longitude (or projected easting).
    #[serde(default)]
    pub x: Option<f64>,
    /// Latitude (or projected northing).
    #[serde(default)]
    pub y: Option<f64>,
}

impl Geometry {
    /// True when neither coordinate was supplied.
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none()
    }
}

/// One remote record: attributes plus optional point geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub attributes: Record,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// Error object some services embed in a 200 response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// One decoded page of a feature query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeaturePage {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

impl FeaturePage {
    /// Builds a page from features directly.
    pub fn from_features(features: Vec<Feature>) -> Self {
        Self {
            features,
            ..Self::default()
        }
    }
}

/// Ordered sequence of normalized records.
///
/// The schema is the union of all keys seen, in first-seen order. A record
/// lacking one of those keys simply has no value there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    records: Vec<Record>,
    columns: Vec<String>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record, extending the column set with any new keys.
    pub fn push(&mut self, record: Record) {
        let known: HashSet<&str> = self.columns.iter().map(String::as_str).collect();
        let fresh: Vec<String> = record
            .keys()
            .filter(|k| !known.contains(k.as_str()))
            .cloned()
            .collect();
        self.columns.extend(fresh);
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl FromIterator<Record> for Table {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut table = Table::new();
        for record in iter {
            table.push(record);
        }
        table
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Outcome category of a planning decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Conditional,
    Refused,
    Unconditional,
    /// Any other literal, including empty or missing.
    Other,
}

impl Decision {
    /// Classifies a raw decision string, ignoring surrounding whitespace.
    ///
    /// Matching is exact and case-sensitive.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "CONDITIONAL" => Decision::Conditional,
            "REFUSED" => Decision::Refused,
            "UNCONDITIONAL" => Decision::Unconditional,
            _ => Decision::Other,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Conditional => write!(f, "Conditional"),
            Decision::Refused => write!(f, "Refused"),
            Decision::Unconditional => write!(f, "Unconditional"),
            Decision::Other => write!(f, "Other"),
        }
    }
}

/// Decision percentages for one received-year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyStat {
    /// Calendar year the applications were received.
    pub year: i32,
    /// Number of applications received that year.
    pub applications: usize,
    /// Percentage decided CONDITIONAL, two decimal places.
    pub conditional_rate: f64,
    /// Percentage decided REFUSED, two decimal places.
    pub refusal_rate: f64,
    /// Percentage decided UNCONDITIONAL, two decimal places.
    pub unconditional_rate: f64,
}

impl YearlyStat {
    /// Share of applications outside the three counted categories.
    ///
    /// Each counted rate is rounded on its own, so together they can reach
    /// 100.01. The residual is floored at zero.
    pub fn other_rate(&self) -> f64 {
        let counted = self.conditional_rate + self.refusal_rate + self.unconditional_rate;
        let other = ((100.0 - counted) * 100.0).round() / 100.0;
        if other > 0.0 {
            other
        } else {
            0.0
        }
    }
}
