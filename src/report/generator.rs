//! Yearly statistics report generation.
//!
//! This module renders the per-year decision rates for one authority as
//! Markdown or JSON, together with metadata about the retrieval run.

use crate::models::YearlyStat;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata about the retrieval run a report was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Query endpoint the records came from.
    pub source_url: String,
    /// When retrieval finished.
    pub retrieved_at: DateTime<Utc>,
    /// Records in the retrieved table.
    pub records: usize,
    /// Successful pages fetched.
    pub pages: usize,
    /// False when retrieval stopped early on an error.
    pub complete: bool,
    /// Wall-clock duration of retrieval in seconds.
    pub duration_seconds: f64,
}

/// Decision statistics for one planning authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    pub authority: String,
    pub metadata: RunMetadata,
    pub years: Vec<YearlyStat>,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &StatsReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Planning Decisions: {}\n\n", report.authority));
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_years_section(&report.years));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source_url));
    section.push_str(&format!(
        "- **Retrieved:** {}\n",
        metadata.retrieved_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Records:** {}\n", metadata.records));
    section.push_str(&format!("- **Pages:** {}\n", metadata.pages));
    if !metadata.complete {
        section.push_str("- **Warning:** retrieval ended early; figures may be incomplete\n");
    }
    section.push_str(&format!(
        "- **Retrieval Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Markdown table of yearly rates.
pub fn generate_years_section(years: &[YearlyStat]) -> String {
    let mut section = String::new();

    section.push_str("## Decisions by Received Year\n\n");

    if years.is_empty() {
        section.push_str("No applications found for this authority.\n\n");
        return section;
    }

    section.push_str(
        "| Received Year | Applications | Conditional Rate | Refusal Rate | Unconditional Rate | Other |\n",
    );
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|\n");

    for stat in years {
        section.push_str(&format!(
            "| {} | {} | {:.2}% | {:.2}% | {:.2}% | {:.2}% |\n",
            stat.year,
            stat.applications,
            stat.conditional_rate,
            stat.refusal_rate,
            stat.unconditional_rate,
            stat.other_rate(),
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Generated by planstats v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report string.
pub fn generate_json_report(report: &StatsReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")
}

/// Write a Markdown report to a file.
pub fn write_report(report: &StatsReport, path: &Path) -> Result<()> {
    std::fs::write(path, generate_markdown_report(report))
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
