//! Report and export writers.

pub mod delimited;
pub mod generator;

pub use delimited::{write_stats_csv, write_table_csv, write_table_json};
pub use generator::{generate_json_report, generate_markdown_report, RunMetadata, StatsReport};
