//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// PlanStats - planning application retrieval and decision statistics
///
/// Pages through a planning-applications feature service, writes the
/// normalized records to a table file, and optionally reports per-year
/// approval and refusal rates for one planning authority.
///
/// Examples:
///   planstats --authority "Galway County Council"
///   planstats --all --stats "Galway County Council" --stats-output galway.md
///   planstats --authority "Galway County Council" --count
///   planstats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Only retrieve applications for this planning authority
    #[arg(short, long, value_name = "NAME", conflicts_with = "all")]
    pub authority: Option<String>,

    /// Retrieve applications for every authority
    #[arg(long)]
    pub all: bool,

    /// Report yearly decision rates for this authority
    ///
    /// Defaults to --authority when given without a value.
    #[arg(long, value_name = "NAME", num_args = 0..=1, default_missing_value = "")]
    pub stats: Option<String>,

    /// Only count matching records (requests the authority field alone)
    #[arg(long, conflicts_with_all = ["stats", "output"])]
    pub count: bool,

    /// Output file for the retrieved table
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Table output format
    #[arg(long, default_value = "csv", value_name = "FORMAT")]
    pub format: TableFormat,

    /// Skip writing the retrieved table
    #[arg(long)]
    pub no_table: bool,

    /// Output file for the statistics report (printed when omitted)
    #[arg(long, value_name = "FILE")]
    pub stats_output: Option<PathBuf>,

    /// Statistics report format
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub stats_format: StatsFormat,

    /// Feature service query endpoint
    #[arg(long, value_name = "URL", env = "PLANSTATS_URL")]
    pub url: Option<String>,

    /// Records per page
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .planstats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .planstats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the retrieved table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TableFormat {
    /// Comma-separated values (default)
    #[default]
    Csv,
    /// JSON array of records
    Json,
}

/// Output format for the statistics report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StatsFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// Comma-separated values
    Csv,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Authority to compute statistics for, if any.
    pub fn stats_authority(&self) -> Option<&str> {
        match self.stats.as_deref() {
            Some("") => self.authority.as_deref(),
            other => other,
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.authority.is_none() && !self.all {
            return Err("Specify --authority <NAME> or --all".to_string());
        }

        if let Some(ref authority) = self.authority {
            if authority.trim().is_empty() {
                return Err("Authority name must not be empty".to_string());
            }
        }

        if self.stats.is_some() && self.stats_authority().is_none() {
            return Err("--stats needs an authority name when used with --all".to_string());
        }

        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Query URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.page_size == Some(0) {
            return Err("Page size must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
