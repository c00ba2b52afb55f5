//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.planstats.toml` files.

use crate::analysis::StatFields;
use crate::retriever::{DateFieldRule, RetrieveConfig};
use crate::source::DEFAULT_QUERY_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".planstats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Feature service settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Pacing and rate-limit recovery.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Field names used by normalization and aggregation.
    #[serde(default)]
    pub fields: FieldsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default path for the retrieved table.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "planning_applications.csv".to_string()
}

/// Feature service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// FeatureServer layer `/query` endpoint.
    #[serde(default = "default_url")]
    pub url: String,

    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Field holding the planning authority name.
    #[serde(default = "default_authority_field")]
    pub authority_field: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            page_size: default_page_size(),
            timeout_seconds: default_timeout(),
            authority_field: default_authority_field(),
        }
    }
}

fn default_url() -> String {
    DEFAULT_QUERY_URL.to_string()
}

fn default_page_size() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    60
}

fn default_authority_field() -> String {
    "PlanningAuthority".to_string()
}

/// Pacing between requests and rate-limit recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Pause after each successful page, in milliseconds.
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,

    /// Pause after a 429 before retrying the same page, in milliseconds.
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay_ms: u64,

    /// Consecutive 429s tolerated at one offset. Unset retries forever.
    #[serde(default)]
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            page_delay_ms: default_page_delay(),
            rate_limit_delay_ms: default_rate_limit_delay(),
            max_rate_limit_retries: None,
        }
    }
}

fn default_page_delay() -> u64 {
    1000
}

fn default_rate_limit_delay() -> u64 {
    10_000
}

/// Field names read during normalization and aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    /// Attributes whose key contains this (any case) are treated as dates.
    #[serde(default = "default_date_key_pattern")]
    pub date_key_pattern: String,

    /// Field holding the decision outcome.
    #[serde(default = "default_decision_field")]
    pub decision_field: String,

    /// Field holding the date an application was received.
    #[serde(default = "default_received_field")]
    pub received_field: String,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            date_key_pattern: default_date_key_pattern(),
            decision_field: default_decision_field(),
            received_field: default_received_field(),
        }
    }
}

fn default_date_key_pattern() -> String {
    "date".to_string()
}

fn default_decision_field() -> String {
    "Decision".to_string()
}

fn default_received_field() -> String {
    "ReceivedDate".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only explicitly provided CLI values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.url {
            self.source.url = url.clone();
        }
        if let Some(page_size) = args.page_size {
            self.source.page_size = page_size;
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Paging settings for the retriever.
    pub fn retrieve_config(&self) -> RetrieveConfig {
        RetrieveConfig {
            page_size: self.source.page_size,
            page_delay: Duration::from_millis(self.retry.page_delay_ms),
            rate_limit_delay: Duration::from_millis(self.retry.rate_limit_delay_ms),
            max_rate_limit_retries: self.retry.max_rate_limit_retries,
            authority_field: self.source.authority_field.clone(),
        }
    }

    pub fn date_rule(&self) -> DateFieldRule {
        DateFieldRule::key_contains(self.fields.date_key_pattern.clone())
    }

    pub fn stat_fields(&self) -> StatFields {
        StatFields {
            authority: self.source.authority_field.clone(),
            decision: self.fields.decision_field.clone(),
            received: self.fields.received_field.clone(),
        }
    }

    /// Log level from the CLI flags and `[general] verbose`.
    ///
    /// `--quiet` wins over a verbose config file.
    pub fn log_level(&self, args: &crate::cli::Args) -> tracing::Level {
        if self.general.verbose && !args.quiet {
            tracing::Level::DEBUG
        } else {
            args.log_level()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_seconds)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.source.page_size, 1000);
        assert_eq!(config.source.authority_field, "PlanningAuthority");
        assert_eq!(config.retry.page_delay_ms, 1000);
        assert_eq!(config.retry.rate_limit_delay_ms, 10_000);
        assert!(config.retry.max_rate_limit_retries.is_none());
        assert!(config.source.url.contains("IrishPlanningApplications"));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "galway.csv"
verbose = true

[source]
page_size = 500

[retry]
rate_limit_delay_ms = 30000
max_rate_limit_retries = 5

[fields]
received_field = "DateReceived"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "galway.csv");
        assert!(config.general.verbose);
        assert_eq!(config.source.page_size, 500);
        assert_eq!(config.source.timeout_seconds, 60);
        assert_eq!(config.retry.page_delay_ms, 1000);
        assert_eq!(config.retry.max_rate_limit_retries, Some(5));
        assert_eq!(config.fields.received_field, "DateReceived");
        assert_eq!(config.fields.decision_field, "Decision");
    }

    #[test]
    fn test_retrieve_config_conversion() {
        let mut config = Config::default();
        config.retry.page_delay_ms = 250;
        config.retry.max_rate_limit_retries = Some(3);

        let retrieve = config.retrieve_config();
        assert_eq!(retrieve.page_delay, Duration::from_millis(250));
        assert_eq!(retrieve.rate_limit_delay, Duration::from_secs(10));
        assert_eq!(retrieve.max_rate_limit_retries, Some(3));
        assert_eq!(retrieve.page_size, 1000);
    }

    #[test]
    fn test_date_rule_and_stat_fields() {
        let mut config = Config::default();
        config.fields.date_key_pattern = "DT".to_string();

        assert!(config.date_rule().matches("received_dt"));
        assert!(!config.date_rule().matches("ReceivedDate"));
        assert_eq!(config.stat_fields().received, "ReceivedDate");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[source]\npage_size = 250\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.source.page_size, 250);
        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_verbose_config_raises_log_level() {
        let args = crate::cli::Args::parse_from(["planstats", "--all"]);
        let mut config = Config::default();
        assert_eq!(config.log_level(&args), tracing::Level::INFO);

        config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert_eq!(config.log_level(&args), tracing::Level::DEBUG);

        let quiet = crate::cli::Args::parse_from(["planstats", "--all", "--quiet"]);
        assert_eq!(config.log_level(&quiet), tracing::Level::ERROR);
    }

    #[test]
    fn test_verbose_flag_merges_into_config() {
        let args = crate::cli::Args::parse_from(["planstats", "--all", "--verbose"]);
        let mut config = Config::default();
        config.merge_with_args(&args);

        assert!(config.general.verbose);
        assert_eq!(config.log_level(&args), tracing::Level::DEBUG);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[fields]"));
    }
}
