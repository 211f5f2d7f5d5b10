//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.surveytally.toml` files. Defaults reproduce the FEVS employee
//! engagement analysis.

use crate::cli::{AnalyzeArgs, FetchArgs, OutputFormat};
use crate::models::{
    Baselines, GroupDimension, Polarity, QuestionSpec, ScaleBounds, SurveySpec, TurnoverSpec,
};
use crate::table::TableShape;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".surveytally.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Response table location and shape.
    #[serde(default)]
    pub input: InputConfig,

    /// Questions, group dimensions and turnover field.
    #[serde(default)]
    pub survey: SurveyConfig,

    /// Baseline comparison constants.
    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Output file names.
    #[serde(default)]
    pub output: OutputConfig,

    /// Visual summary settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Data file probing settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Input table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Path to the delimited response file.
    #[serde(default = "default_input_path")]
    pub path: String,

    /// Field delimiter; inferred from the extension when unset.
    #[serde(default)]
    pub delimiter: Option<String>,

    /// Fewer data rows than this is treated as no data.
    #[serde(default = "default_min")]
    pub min_rows: usize,

    /// Fewer columns than this is treated as no data.
    #[serde(default = "default_min")]
    pub min_columns: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input_path(),
            delimiter: None,
            min_rows: default_min(),
            min_columns: default_min(),
        }
    }
}

fn default_input_path() -> String {
    "2024_FEVS_Prdf.csv".to_string()
}

fn default_min() -> usize {
    1
}

impl InputConfig {
    pub fn shape(&self) -> TableShape {
        TableShape {
            min_rows: self.min_rows,
            min_columns: self.min_columns,
        }
    }

    /// Parse the configured delimiter into a single byte.
    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        let Some(ref raw) = self.delimiter else {
            return Ok(None);
        };

        match raw.as_str() {
            "\\t" | "\t" | "tab" => Ok(Some(b'\t')),
            s if s.len() == 1 && s.is_ascii() => Ok(Some(s.as_bytes()[0])),
            other => bail!("Delimiter must be a single ASCII character, got '{}'", other),
        }
    }
}

/// Survey layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Agreement-scale values at or below this are positive.
    #[serde(default = "default_threshold")]
    pub positive_threshold: f64,

    /// Lowest valid scale code.
    #[serde(default = "default_scale_min")]
    pub scale_min: f64,

    /// Highest valid scale code.
    #[serde(default = "default_scale_max")]
    pub scale_max: f64,

    /// Scored questions, in reporting order.
    #[serde(default = "default_questions")]
    pub questions: Vec<QuestionConfig>,

    /// Group dimensions, in reporting order.
    #[serde(default = "default_groups")]
    pub groups: Vec<GroupConfig>,

    /// Turnover-intent field.
    #[serde(default = "default_turnover")]
    pub turnover: Option<TurnoverConfig>,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            positive_threshold: default_threshold(),
            scale_min: default_scale_min(),
            scale_max: default_scale_max(),
            questions: default_questions(),
            groups: default_groups(),
            turnover: default_turnover(),
        }
    }
}

/// One scored question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Overrides the agreement-scale threshold for this question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,
}

/// One grouping dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub field: String,
    #[serde(default)]
    pub label: String,
}

/// Turnover-intent field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnoverConfig {
    pub field: String,
    #[serde(default)]
    pub description: String,
    /// Code meaning "yes, considering leaving".
    #[serde(default = "default_affirmative")]
    pub affirmative_code: f64,
}

fn default_threshold() -> f64 {
    2.0
}

fn default_scale_min() -> f64 {
    1.0
}

fn default_scale_max() -> f64 {
    5.0
}

fn default_affirmative() -> f64 {
    1.0
}

fn default_questions() -> Vec<QuestionConfig> {
    [
        ("Q40", "Opportunity to improve skills"),
        ("Q12", "Know what is expected of me"),
        ("Q42", "Supervisor supports work-life balance"),
        ("Q69", "Overall job satisfaction"),
        ("Q11", "Encouraged to come up with new ideas"),
        ("Q13", "Physical conditions allow good performance"),
        ("Q14", "Training needs are assessed"),
        ("Q15", "Satisfied with training received"),
    ]
    .into_iter()
    .map(|(id, description)| QuestionConfig {
        id: id.to_string(),
        description: description.to_string(),
        polarity: None,
    })
    .collect()
}

fn default_groups() -> Vec<GroupConfig> {
    vec![
        GroupConfig {
            field: "DAGENCYSZ".to_string(),
            label: "Organization size".to_string(),
        },
        GroupConfig {
            field: "DSUPER".to_string(),
            label: "Supervisory status".to_string(),
        },
    ]
}

fn default_turnover() -> Option<TurnoverConfig> {
    Some(TurnoverConfig {
        field: "DLEAVING".to_string(),
        description: "Considering leaving organization within next year".to_string(),
        affirmative_code: default_affirmative(),
    })
}

impl SurveyConfig {
    pub fn scale(&self) -> ScaleBounds {
        ScaleBounds {
            min: self.scale_min,
            max: self.scale_max,
        }
    }

    /// Validate and convert into the typed survey layout.
    pub fn to_spec(&self) -> Result<SurveySpec> {
        let scale = self.scale();
        if !(scale.min < scale.max) {
            bail!(
                "Scale minimum ({}) must be below maximum ({})",
                scale.min,
                scale.max
            );
        }
        if !scale.contains(self.positive_threshold) {
            bail!(
                "Positive threshold {} lies outside the scale {}..={}",
                self.positive_threshold,
                scale.min,
                scale.max
            );
        }

        let mut seen = HashSet::new();
        let mut questions = Vec::with_capacity(self.questions.len());
        for q in &self.questions {
            let id = q.id.trim();
            if id.is_empty() {
                bail!("Question ids must not be empty");
            }
            if !seen.insert(id.to_string()) {
                bail!("Duplicate question id '{}'", id);
            }
            questions.push(QuestionSpec {
                id: id.to_string(),
                description: if q.description.is_empty() {
                    id.to_string()
                } else {
                    q.description.clone()
                },
                scale: Some(scale),
                polarity: q.polarity.unwrap_or(Polarity::LowerIsPositive {
                    threshold: self.positive_threshold,
                }),
            });
        }

        let mut groups = Vec::with_capacity(self.groups.len());
        for g in &self.groups {
            let field = g.field.trim();
            if field.is_empty() {
                bail!("Group dimension fields must not be empty");
            }
            groups.push(GroupDimension {
                field: field.to_string(),
                label: if g.label.is_empty() {
                    field.to_string()
                } else {
                    g.label.clone()
                },
            });
        }

        // An empty field disables the turnover metric.
        let turnover = self
            .turnover
            .as_ref()
            .filter(|t| !t.field.trim().is_empty())
            .map(|t| TurnoverSpec {
                field: t.field.trim().to_string(),
                description: t.description.clone(),
                polarity: Polarity::MatchesCode {
                    code: t.affirmative_code,
                },
            });

        // The turnover field gets its own unbounded numeric view.
        if let Some(ref t) = turnover {
            if seen.contains(&t.field) {
                bail!(
                    "Turnover field '{}' is also configured as a question",
                    t.field
                );
            }
        }

        Ok(SurveySpec {
            questions,
            groups,
            turnover,
        })
    }
}

/// Baseline comparison constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Your organization's engagement, in percent.
    #[serde(default = "default_engagement_baseline")]
    pub engagement: f64,

    /// Your organization's voluntary turnover, in percent.
    #[serde(default = "default_turnover_baseline")]
    pub turnover: f64,

    /// Engagement target, in percent.
    #[serde(default = "default_target")]
    pub target_engagement: Option<f64>,

    /// Extra scorecard lines, e.g. `"Manager confidence" = "4.2/10"`.
    #[serde(default)]
    pub notes: Vec<BaselineNote>,
}

/// A free-form baseline shown on the scorecard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineNote {
    pub label: String,
    pub value: String,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            engagement: default_engagement_baseline(),
            turnover: default_turnover_baseline(),
            target_engagement: default_target(),
            notes: Vec::new(),
        }
    }
}

fn default_engagement_baseline() -> f64 {
    62.0
}

fn default_turnover_baseline() -> f64 {
    18.0
}

fn default_target() -> Option<f64> {
    Some(70.0)
}

impl BaselineConfig {
    pub fn to_baselines(&self) -> Baselines {
        Baselines {
            engagement: self.engagement,
            turnover: self.turnover,
            target_engagement: self.target_engagement,
        }
    }
}

/// Output artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory all artifacts are written to.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Per-question summary table.
    #[serde(default = "default_summary_csv")]
    pub summary_csv: String,

    /// Per-group tables are named `<prefix><field>.csv`.
    #[serde(default = "default_group_prefix")]
    pub group_csv_prefix: String,

    /// Visual summary file stem; the extension follows the format.
    #[serde(default = "default_report_stem")]
    pub report: String,

    /// Visual summary format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            summary_csv: default_summary_csv(),
            group_csv_prefix: default_group_prefix(),
            report: default_report_stem(),
            format: OutputFormat::default(),
        }
    }
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_summary_csv() -> String {
    "engagement_summary.csv".to_string()
}

fn default_group_prefix() -> String {
    "engagement_by_".to_string()
}

fn default_report_stem() -> String {
    "analysis_summary".to_string()
}

impl OutputConfig {
    pub fn dir(&self) -> PathBuf {
        PathBuf::from(&self.dir)
    }
}

/// Visual summary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Width in characters of a 100% bar.
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,

    /// Draw baseline and target reference lines on bar panels.
    #[serde(default = "default_true")]
    pub reference_lines: bool,

    /// Use colour markers for below-baseline / above-target bars.
    #[serde(default = "default_true")]
    pub colour_bands: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            bar_width: default_bar_width(),
            reference_lines: true,
            colour_bands: true,
        }
    }
}

fn default_title() -> String {
    "Employee Engagement Analysis".to_string()
}

fn default_bar_width() -> usize {
    40
}

fn default_true() -> bool {
    true
}

/// Best-effort data file probing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Candidate URLs, tried once each in order.
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,

    /// Responses at or below this size are treated as error pages.
    #[serde(default = "default_min_bytes")]
    pub min_bytes: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Saved file name without extension.
    #[serde(default = "default_output_stem")]
    pub output_stem: String,

    /// Landing page shown when manual download is needed.
    #[serde(default = "default_portal")]
    pub portal_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            min_bytes: default_min_bytes(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            output_stem: default_output_stem(),
            portal_url: default_portal(),
        }
    }
}

fn default_urls() -> Vec<String> {
    vec![
        "https://www.opm.gov/fevs/reports/Datasets/2024_FEVS_Prdf.xlsx",
        "https://www.opm.gov/fevs/public-data-file/2024_FEVS_Prdf.xlsx",
        "https://www.opm.gov/fevs/reports/Datasets/2024_FEVS_Prdf.csv",
        "https://www.opm.gov/fevs/public-data-file/2024_FEVS_Prdf.csv",
        "https://www.opm.gov/fevs/reports/data-files/2024-FEVS-Public-Data-File.csv",
        "https://www.opm.gov/fevs/reports/data-files/2024-FEVS-Public-Data-File.xlsx",
        "https://www.opm.gov/fevs/reports/Datasets/2023_FEVS_Prdf.csv",
        "https://www.opm.gov/fevs/reports/Datasets/2023_FEVS_Prdf.xlsx",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_min_bytes() -> u64 {
    10_000
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_output_stem() -> String {
    "2024_FEVS_Prdf".to_string()
}

fn default_portal() -> String {
    "https://www.opm.gov/fevs/public-data-file/".to_string()
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

    /// Apply `analyze` flags. Only explicitly provided values override.
    pub fn merge_analyze(&mut self, args: &AnalyzeArgs) {
        if let Some(ref input) = args.input {
            self.input.path = input.display().to_string();
        }
        if let Some(ref dir) = args.output_dir {
            self.output.dir = dir.display().to_string();
        }
        if let Some(format) = args.format {
            self.output.format = format;
        }
        if let Some(baseline) = args.baseline {
            self.baseline.engagement = baseline;
        }
        if let Some(turnover) = args.turnover_baseline {
            self.baseline.turnover = turnover;
        }
        if let Some(target) = args.target {
            self.baseline.target_engagement = Some(target);
        }
        if let Some(threshold) = args.threshold {
            self.survey.positive_threshold = threshold;
        }
    }

    /// Apply `fetch` flags. Only explicitly provided values override.
    pub fn merge_fetch(&mut self, args: &FetchArgs) {
        if !args.urls.is_empty() {
            self.fetch.urls = args.urls.clone();
        }
        if let Some(ref dir) = args.output_dir {
            self.output.dir = dir.display().to_string();
        }
        if let Some(min_bytes) = args.min_bytes {
            self.fetch.min_bytes = min_bytes;
        }
        if let Some(timeout) = args.timeout {
            self.fetch.timeout_seconds = timeout;
        }
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

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.input.path, "2024_FEVS_Prdf.csv");
        assert_eq!(config.survey.questions.len(), 8);
        assert_eq!(config.survey.questions[0].id, "Q40");
        assert_eq!(config.baseline.engagement, 62.0);
        assert_eq!(config.baseline.target_engagement, Some(70.0));
        assert_eq!(config.fetch.min_bytes, 10_000);
        assert_eq!(config.fetch.urls.len(), 8);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[input]
path = "responses.tsv"
delimiter = "tab"

[survey]
positive_threshold = 2.0

[[survey.questions]]
id = "Q1"
description = "Enjoy my work"

[[survey.questions]]
id = "Q2"
polarity = { kind = "matches_code", code = 1.0 }

[[survey.groups]]
field = "REGION"

[baseline]
engagement = 55.5
target_engagement = 65.0
notes = [{ label = "Manager confidence", value = "4.2/10" }]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.path, "responses.tsv");
        assert_eq!(config.input.delimiter_byte().unwrap(), Some(b'\t'));
        assert_eq!(config.survey.questions.len(), 2);
        assert_eq!(config.baseline.engagement, 55.5);
        assert_eq!(config.baseline.turnover, 18.0);
        assert_eq!(config.baseline.notes[0].value, "4.2/10");
        // Unspecified turnover keeps the default field.
        assert_eq!(config.survey.turnover.as_ref().unwrap().field, "DLEAVING");

        let spec = config.survey.to_spec().unwrap();
        assert_eq!(
            spec.questions[0].polarity,
            Polarity::LowerIsPositive { threshold: 2.0 }
        );
        assert_eq!(spec.questions[1].polarity, Polarity::MatchesCode { code: 1.0 });
        assert_eq!(spec.questions[1].description, "Q2");
        assert_eq!(spec.groups[0].label, "REGION");
    }

    #[test]
    fn test_to_spec_turnover_polarity() {
        let spec = Config::default().survey.to_spec().unwrap();
        let turnover = spec.turnover.unwrap();
        assert_eq!(turnover.polarity, Polarity::MatchesCode { code: 1.0 });
        assert_eq!(spec.questions[0].scale, Some(ScaleBounds::default()));
    }

    #[test]
    fn test_to_spec_rejects_duplicates() {
        let mut survey = SurveyConfig::default();
        survey.questions.push(QuestionConfig {
            id: "Q40".to_string(),
            description: String::new(),
            polarity: None,
        });
        let err = survey.to_spec().unwrap_err();
        assert!(err.to_string().contains("Duplicate question id"));
    }

    #[test]
    fn test_to_spec_rejects_turnover_question_overlap() {
        let mut survey = SurveyConfig::default();
        survey.questions.push(QuestionConfig {
            id: "DLEAVING".to_string(),
            description: String::new(),
            polarity: None,
        });
        let err = survey.to_spec().unwrap_err();
        assert!(err.to_string().contains("also configured as a question"));

        // Disabling the turnover metric removes the conflict.
        survey.turnover = None;
        assert!(survey.to_spec().is_ok());
    }

    #[test]
    fn test_to_spec_rejects_bad_threshold() {
        let mut survey = SurveyConfig::default();
        survey.positive_threshold = 7.0;
        assert!(survey.to_spec().is_err());

        let mut survey = SurveyConfig::default();
        survey.scale_min = 5.0;
        survey.scale_max = 1.0;
        assert!(survey.to_spec().is_err());
    }

    #[test]
    fn test_delimiter_byte() {
        let mut input = InputConfig::default();
        assert_eq!(input.delimiter_byte().unwrap(), None);
        input.delimiter = Some(";".to_string());
        assert_eq!(input.delimiter_byte().unwrap(), Some(b';'));
        input.delimiter = Some("||".to_string());
        assert!(input.delimiter_byte().is_err());
    }

    #[test]
    fn test_merge_analyze() {
        let mut config = Config::default();
        let args = AnalyzeArgs {
            input: Some(PathBuf::from("other.csv")),
            output_dir: None,
            format: Some(OutputFormat::Json),
            baseline: Some(60.0),
            turnover_baseline: None,
            target: None,
            threshold: None,
            dry_run: false,
        };

        config.merge_analyze(&args);
        assert_eq!(config.input.path, "other.csv");
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.baseline.engagement, 60.0);
        assert_eq!(config.baseline.turnover, 18.0);
        assert_eq!(config.output.dir, ".");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[[survey.questions]]"));
        assert!(toml_str.contains("[baseline]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.survey.questions.len(), 8);
    }
}
