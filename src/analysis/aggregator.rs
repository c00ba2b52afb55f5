//! Per-year decision statistics.
//!
//! This module reduces a record table, restricted to one planning authority,
//! to the share of applications in each decision category per received-year.

use crate::models::{Decision, Record, Table, YearlyStat};
use crate::retriever::normalize::CANONICAL_FORMAT;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Names of the fields the aggregation reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFields {
    pub authority: String,
    pub decision: String,
    pub received: String,
}

impl Default for StatFields {
    fn default() -> Self {
        Self {
            authority: "PlanningAuthority".to_string(),
            decision: "Decision".to_string(),
            received: "ReceivedDate".to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct YearCounts {
    total: usize,
    conditional: usize,
    refused: usize,
    unconditional: usize,
}

impl YearCounts {
    fn add(&mut self, decision: Decision) {
        self.total += 1;
        match decision {
            Decision::Conditional => self.conditional += 1,
            Decision::Refused => self.refused += 1,
            Decision::Unconditional => self.unconditional += 1,
            Decision::Other => {}
        }
    }

    fn into_stat(self, year: i32) -> YearlyStat {
        YearlyStat {
            year,
            applications: self.total,
            conditional_rate: rate(self.conditional, self.total),
            refusal_rate: rate(self.refused, self.total),
            unconditional_rate: rate(self.unconditional, self.total),
        }
    }
}

/// Yearly stats for `authority` using the default field names.
pub fn aggregate(table: &Table, authority: &str) -> Vec<YearlyStat> {
    yearly_stats(table, authority, &StatFields::default())
}

/// Yearly stats for `authority`, ordered by ascending year.
///
/// Rows whose received date cannot be read are left out of every year.
/// An absent authority yields an empty result.
pub fn yearly_stats(table: &Table, authority: &str, fields: &StatFields) -> Vec<YearlyStat> {
    let mut years: BTreeMap<i32, YearCounts> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in table.iter().filter(|r| is_authority(r, &fields.authority, authority)) {
        let Some(year) = record.get(&fields.received).and_then(received_year) else {
            skipped += 1;
            continue;
        };
        years.entry(year).or_default().add(decision_of(record, &fields.decision));
    }

    if skipped > 0 {
        debug!(
            "Skipped {} {} records with no readable {}",
            skipped, authority, fields.received
        );
    }

    years
        .into_iter()
        .map(|(year, counts)| counts.into_stat(year))
        .collect()
}

/// Number of records per authority, keyed by name.
pub fn authority_counts(table: &Table, field: &str) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in table {
        if let Some(name) = record.get(field).and_then(Value::as_str) {
            *counts.entry(name.to_string()).or_default() += 1;
        }
    }
    counts
}

/// Decision category distribution across the whole table.
pub fn decision_distribution(table: &Table, field: &str) -> HashMap<Decision, usize> {
    let mut dist: HashMap<Decision, usize> = HashMap::new();
    for record in table {
        *dist.entry(decision_of(record, field)).or_default() += 1;
    }
    dist
}

fn is_authority(record: &Record, field: &str, name: &str) -> bool {
    record.get(field).and_then(Value::as_str) == Some(name)
}

fn decision_of(record: &Record, field: &str) -> Decision {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(Decision::from_raw)
        .unwrap_or(Decision::Other)
}

/// Calendar year of a received-date value.
///
/// Accepts the canonical text form, a bare date, ISO/RFC 3339 timestamps,
/// or raw epoch milliseconds.
pub fn received_year(value: &Value) -> Option<i32> {
    match value {
        Value::String(s) => parse_year(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.year()),
        _ => None,
    }
}

fn parse_year(s: &str) -> Option<i32> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, CANONICAL_FORMAT) {
        return Some(dt.year());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.year());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.year());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(|d| d.year())
}

/// Percentage of `count` in `total`, rounded to two places; 0 when empty.
fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = count as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}
