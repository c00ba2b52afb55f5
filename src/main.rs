//! PlanStats - planning application retrieval and decision statistics
//!
//! A CLI tool that pages through a planning-applications feature service,
//! normalizes every record into a single table, and derives per-year
//! conditional/refusal/unconditional rates for a planning authority.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, output writing, client setup)
//!   2 - Retrieval ended early; whatever was retrieved has still been written

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use planstats::analysis;
use planstats::cli::{Args, StatsFormat, TableFormat};
use planstats::config::{Config, CONFIG_FILE};
use planstats::models::Table;
use planstats::report::{self, RunMetadata, StatsReport};
use planstats::retriever::{Completion, Retriever};
use planstats::source::{ArcGisClient, AuthorityFilter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let (mut config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.log_level(&args));

    info!("PlanStats v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", origin);
    debug!("Arguments: {:?}", args);

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .planstats.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the query URL, paging, pacing, and field names.");
    Ok(())
}

/// Initialize logging at the resolved verbosity.
fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run retrieval and reporting. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let filter = AuthorityFilter::from_option(args.authority.clone());
    let client = ArcGisClient::new(config.source.url.clone(), config.timeout())?;
    let spinner = make_spinner(args.quiet);

    let progress = spinner.clone();
    let retriever = Retriever::new(client, config.retrieve_config())
        .with_date_rule(config.date_rule())
        .on_page(move |p| progress.set_message(format!("{} records ({} pages)", p.total, p.page)));

    println!("📥 Querying {}", config.source.url);
    match filter {
        AuthorityFilter::All => println!("   Scope: all planning authorities"),
        AuthorityFilter::Authority(ref name) => println!("   Scope: {}", name),
    }

    if args.count {
        let count = retriever.count(&filter).await;
        spinner.finish_and_clear();
        println!("\n📊 Total records: {}", count.records);
        return Ok(exit_code_for(&count.completion));
    }

    let start_time = Instant::now();
    let retrieval = retriever.retrieve(&filter).await;
    let duration = start_time.elapsed().as_secs_f64();
    spinner.finish_and_clear();

    println!(
        "\n📦 Retrieved {} records over {} pages in {:.1}s",
        retrieval.table.len(),
        retrieval.pages,
        duration
    );
    if let Completion::Aborted(ref e) = retrieval.completion {
        warn!("Retrieval ended early: {}", e);
        eprintln!("⚠️  Retrieval ended early ({}). Output may be incomplete.", e);
    }

    if !args.no_table {
        let path = PathBuf::from(&config.general.output);
        write_table(&retrieval.table, &path, args.format)?;
        println!("💾 Table saved to: {}", path.display());
    }

    if let Some(authority) = args.stats_authority() {
        let metadata = RunMetadata {
            source_url: config.source.url.clone(),
            retrieved_at: Utc::now(),
            records: retrieval.table.len(),
            pages: retrieval.pages,
            complete: retrieval.is_complete(),
            duration_seconds: duration,
        };
        emit_stats(&args, &config, &retrieval.table, authority, metadata)?;
    } else if filter == AuthorityFilter::All {
        print_top_authorities(&retrieval.table, &config.source.authority_field);
    }

    Ok(exit_code_for(&retrieval.completion))
}

fn exit_code_for(completion: &Completion) -> i32 {
    match completion {
        Completion::Exhausted => 0,
        Completion::Aborted(_) => 2,
    }
}

fn make_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("waiting for first page");
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn write_table(table: &Table, path: &Path, format: TableFormat) -> Result<()> {
    match format {
        TableFormat::Csv => report::write_table_csv(table, path),
        TableFormat::Json => report::write_table_json(table, path),
    }
}

/// Aggregate yearly stats and print or save them.
fn emit_stats(
    args: &Args,
    config: &Config,
    table: &Table,
    authority: &str,
    metadata: RunMetadata,
) -> Result<()> {
    let years = analysis::yearly_stats(table, authority, &config.stat_fields());
    if years.is_empty() {
        warn!("No records found for authority {}", authority);
    }
    debug!(
        "Decision distribution across table: {:?}",
        analysis::decision_distribution(table, &config.fields.decision_field)
    );

    let stats = StatsReport {
        authority: authority.to_string(),
        metadata,
        years,
    };

    match (&args.stats_output, args.stats_format) {
        (Some(path), StatsFormat::Csv) => report::write_stats_csv(&stats.years, path)?,
        (Some(path), StatsFormat::Markdown) => report::generator::write_report(&stats, path)?,
        (Some(path), StatsFormat::Json) => {
            let json = report::generate_json_report(&stats)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        }
        (None, StatsFormat::Json) => println!("{}", report::generate_json_report(&stats)?),
        (None, StatsFormat::Csv) => {
            report::delimited::write_stats(&stats.years, &mut std::io::stdout().lock(), ',')?
        }
        (None, _) => println!("\n{}", report::generator::generate_years_section(&stats.years)),
    }

    if let Some(ref path) = args.stats_output {
        println!("📝 Statistics saved to: {}", path.display());
    }
    Ok(())
}

fn print_top_authorities(table: &Table, field: &str) {
    let counts = analysis::authority_counts(table, field);
    if counts.is_empty() {
        return;
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

    println!("\n🏛️  Records by authority (top 10):");
    for (name, count) in ranked.iter().take(10) {
        println!("   {:>8}  {}", count, name);
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so it returns a note on where the
/// configuration came from instead of logging it.
fn load_config(args: &Args) -> Result<(Config, String)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, format!("Loaded config from: {}", config_path.display())));
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok((config, format!("Loaded default config from {}", CONFIG_FILE))),
        Ok(None) => Ok((Config::default(), "No config file found, using defaults".to_string())),
        Err(e) => {
            eprintln!("⚠️  Failed to load config: {:#}", e);
            Ok((Config::default(), "Using default config".to_string()))
        }
    }
}
