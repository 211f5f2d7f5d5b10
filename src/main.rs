//! SurveyTally - engagement reporting for survey response tables
//!
//! Loads a delimited response file, aggregates the configured questions
//! overall and per group, compares the result against your baselines, and
//! writes CSV tables plus a visual summary.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing data file, bad config, fetch exhausted, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod extract;
mod fetch;
mod models;
mod report;
mod table;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{AnalyzeArgs, Args, Command, ExtractArgs, FetchArgs};
use config::{Config, CONFIG_FILE};
use fetch::{FetchOptions, FetchOutcome};
use models::{Report, ReportMetadata};
use report::{Reporter, ReporterConfig};
use std::path::Path;
use std::time::Instant;
use table::ResponseTable;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("SurveyTally v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = load_config(&args).and_then(|config| match &args.command {
        Command::Analyze(analyze) => run_analyze(config, analyze),
        Command::Fetch(fetch) => run_fetch(config, fetch, args.quiet),
        Command::Extract(extract) => run_extract(extract),
        Command::InitConfig => Ok(0),
    });

    match result {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .surveytally.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize questions, groups, baselines, and outputs.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

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

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

/// Run the analysis workflow. Returns the exit code.
fn run_analyze(mut config: Config, args: &AnalyzeArgs) -> Result<i32> {
    let start_time = Instant::now();
    config.merge_analyze(args);

    let survey = config
        .survey
        .to_spec()
        .context("Invalid [survey] configuration")?;
    let baselines = config.baseline.to_baselines();
    let input = Path::new(&config.input.path);

    // Step 1: Load the response table
    println!("📥 Loading responses: {}", input.display());
    let delimiter = config.input.delimiter_byte()?;
    let loaded = if config.input.path == "-" {
        ResponseTable::from_reader(
            std::io::stdin().lock(),
            config.input.shape(),
            delimiter.unwrap_or(b','),
        )
    } else {
        ResponseTable::from_path(input, config.input.shape(), delimiter)
    };
    let mut table = match loaded {
        Ok(table) => table,
        Err(e) if e.is_fatal() => {
            error!("{}", e);
            eprintln!("\n❌ {}\n", e);
            eprintln!(
                "{}",
                fetch::manual_instructions(&config.fetch.portal_url, &config.input.path)
            );
            eprintln!("   Or try: surveytally fetch");
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };
    println!(
        "   {} responses × {} columns",
        table.len(),
        table.column_count()
    );
    debug!("Columns: {}", table.headers().join(", "));
    if table.is_empty() {
        warn!("Response table has no rows; every metric will be unavailable");
    }

    // Handle --dry-run: list configured fields and exit
    if args.dry_run {
        return handle_dry_run(&table, &survey);
    }

    // Step 2: Aggregate
    println!("\n🔬 Aggregating {} questions...", survey.questions.len());
    let analysis = analysis::analyze(&mut table, &survey, &baselines);

    // Step 3: Build the report
    let metadata = ReportMetadata {
        source: input.display().to_string(),
        analysis_date: Utc::now(),
        rows_loaded: table.len(),
        columns_loaded: table.column_count(),
        questions_configured: survey.questions.len(),
        missing_fields: analysis.missing_fields.clone(),
        baselines,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = Report {
        metadata,
        questions: analysis.questions,
        groups: analysis.groups,
        headline: analysis.headline,
    };

    // Step 4: Write the exports and the visual summary
    println!("\n📝 Writing outputs...");
    let out_dir = config.output.dir();
    let mut written = report::export_tables(
        &out_dir,
        &config.output.summary_csv,
        &config.output.group_csv_prefix,
        &report.questions,
        &report.groups,
    )?;

    let reporter = Reporter::new(ReporterConfig::from_config(&config));
    let format = config.output.format;
    let summary = reporter.render(&report, format)?;
    let summary_name = format!("{}.{}", config.output.report, format.extension());
    let summary_path = out_dir.join(summary_name);
    std::fs::write(&summary_path, &summary)
        .with_context(|| format!("Failed to write report to {}", summary_path.display()))?;
    written.push(summary_path);

    // Print summary
    let headline = &report.headline;
    println!("\n📊 Engagement Summary:");
    println!("   Engagement index: {}", headline.engagement_index.pct());
    println!(
        "   Gap to baseline ({}%): {} points",
        baselines.engagement,
        headline.gap_to_baseline.signed()
    );
    println!("   Turnover intent: {}", headline.turnover_intent.pct());
    if !report.metadata.missing_fields.is_empty() {
        println!(
            "   ⚠️  Missing fields: {}",
            report.metadata.missing_fields.join(", ")
        );
    }
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());

    println!("\n✅ Analysis complete! Files written:");
    for path in &written {
        println!("   📄 {}", path.display());
    }

    Ok(0)
}

/// Handle --dry-run: report which configured fields are present, then exit.
fn handle_dry_run(table: &ResponseTable, survey: &models::SurveySpec) -> Result<i32> {
    println!("\n🔍 Dry run: checking configured fields (no aggregation)...\n");

    let checks = analysis::check_fields(table, survey);
    for check in &checks {
        let mark = if check.present { "✓" } else { "✗" };
        println!(
            "   {} {:<10} {:<9} {:>7} values  {}",
            mark, check.field, check.role, check.values, check.description
        );
    }

    let present = checks.iter().filter(|c| c.present).count();
    println!("\n   {} of {} configured fields present", present, checks.len());

    println!("\n✅ Dry run complete. Nothing was written.");
    Ok(0)
}

/// Probe the candidate URLs for the data file.
fn run_fetch(mut config: Config, args: &FetchArgs, quiet: bool) -> Result<i32> {
    config.merge_fetch(args);

    println!("📥 Probing {} candidate URLs...", config.fetch.urls.len());
    let options = FetchOptions::from_config(&config.fetch, config.output.dir(), !quiet);

    match fetch::probe(&options)? {
        FetchOutcome::Fetched {
            url,
            bytes,
            content_type,
            saved_to,
        } => {
            println!("\n✅ Downloaded {} bytes from {}", bytes, url);
            if let Some(content_type) = content_type {
                println!("   Content type: {}", content_type);
            }
            println!("   Saved to: {}", saved_to.display());
            Ok(0)
        }
        FetchOutcome::ManualInterventionRequired { attempts } => {
            eprintln!("\n⛔ No candidate URL returned the data file:");
            for attempt in &attempts {
                eprintln!("   - {}: {}", attempt.url, attempt.status);
            }
            eprintln!();
            eprintln!(
                "{}",
                fetch::manual_instructions(&config.fetch.portal_url, &config.input.path)
            );
            Ok(1)
        }
    }
}

/// Dump text and tables from a PDF.
fn run_extract(args: &ExtractArgs) -> Result<i32> {
    println!("📄 Extracting: {}", args.pdf.display());

    let extraction = extract::extract_pdf(&args.pdf)?;
    let stem = args
        .pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let written = extract::write_extraction(&extraction, &args.output_dir, &stem)?;

    println!(
        "\n✅ Extracted {} pages and {} tables:",
        extraction.pages.len(),
        extraction.tables.len()
    );
    for path in &written {
        println!("   📄 {}", path.display());
    }

    Ok(0)
}
