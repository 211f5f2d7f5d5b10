//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SurveyTally - engagement reporting for survey response tables
///
/// Computes positive-response rates and mean scores per question and per
/// group, plus an overall engagement index compared against your baseline.
///
/// Examples:
///   surveytally analyze --input 2024_FEVS_Prdf.csv
///   surveytally analyze --input responses.tsv --baseline 58 --format json
///   surveytally analyze --dry-run
///   surveytally fetch --output-dir data
///   surveytally extract report.pdf --output-dir extracted
///   surveytally init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .surveytally.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Aggregate a response table and write the reports
    Analyze(AnalyzeArgs),

    /// Try candidate URLs for the public data file
    Fetch(FetchArgs),

    /// Dump text and tables from a PDF
    Extract(ExtractArgs),

    /// Generate a default .surveytally.toml configuration file
    InitConfig,
}

/// Flags for `analyze`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Delimited response file (CSV, or TSV by extension; `-` reads stdin)
    #[arg(short, long, value_name = "FILE", env = "SURVEYTALLY_INPUT")]
    pub input: Option<PathBuf>,

    /// Directory for the exported tables and visual summary
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Visual summary format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Your organization's engagement baseline, in percent
    #[arg(long, value_name = "PCT")]
    pub baseline: Option<f64>,

    /// Your organization's voluntary turnover baseline, in percent
    #[arg(long, value_name = "PCT")]
    pub turnover_baseline: Option<f64>,

    /// Engagement target, in percent
    #[arg(long, value_name = "PCT")]
    pub target: Option<f64>,

    /// Agreement-scale codes at or below this count as positive
    #[arg(long, value_name = "N")]
    pub threshold: Option<f64>,

    /// Load the table and list which configured fields are present
    #[arg(long)]
    pub dry_run: bool,
}

/// Flags for `fetch`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Candidate URL (repeatable); replaces the configured list
    #[arg(long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    /// Directory to save the downloaded file in
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Responses at or below this many bytes are rejected
    #[arg(long, value_name = "BYTES")]
    pub min_bytes: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Flags for `extract`.
#[derive(clap::Args, Debug, Clone)]
pub struct ExtractArgs {
    /// PDF document to read
    #[arg(value_name = "PDF")]
    pub pdf: PathBuf,

    /// Directory for the text dump and table CSVs
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,
}

/// Output format for the visual summary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Analyze(analyze) => analyze.validate(),
            Command::Fetch(fetch) => fetch.validate(),
            Command::Extract(extract) => {
                if !extract.pdf.exists() {
                    return Err(format!("PDF not found: {}", extract.pdf.display()));
                }
                Ok(())
            }
            Command::InitConfig => Ok(()),
        }
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

fn check_percent(name: &str, value: Option<f64>) -> Result<(), String> {
    match value {
        Some(v) if !(0.0..=100.0).contains(&v) => {
            Err(format!("{} must be between 0 and 100, got {}", name, v))
        }
        _ => Ok(()),
    }
}

impl AnalyzeArgs {
    pub fn validate(&self) -> Result<(), String> {
        check_percent("Baseline", self.baseline)?;
        check_percent("Turnover baseline", self.turnover_baseline)?;
        check_percent("Target", self.target)?;

        if let Some(threshold) = self.threshold {
            if !threshold.is_finite() {
                return Err("Threshold must be a finite number".to_string());
            }
        }

        Ok(())
    }
}

impl FetchArgs {
    pub fn validate(&self) -> Result<(), String> {
        for url in &self.urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("URL must start with 'http://' or 'https://': {}", url));
            }
        }

        // Validate timeout if provided
        if let Some(0) = self.timeout {
            return Err("Timeout must be at least 1 second".to_string());
        }

        Ok(())
    }
}
