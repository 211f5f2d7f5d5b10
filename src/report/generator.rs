//! Visual summary generation.
//!
//! Renders the four-panel summary (question bars, two group panels and a
//! scorecard) as Markdown with text bars, or the full report as JSON.
//! Styling comes from `ReporterConfig`; nothing here reads global state.

use crate::analysis::sort_by_positive;
use crate::cli::OutputFormat;
use crate::config::{BaselineNote, Config};
use crate::models::{
    AggregateResult, Baselines, GroupReport, Headline, Metric, QuestionSummary, Report,
    ReportMetadata,
};
use anyhow::Result;

const FILLED: char = '█';
const EMPTY: char = '·';
const BASELINE_MARK: char = '|';
const TARGET_MARK: char = ':';
const MAX_LABEL: usize = 44;
/// Narrowest bar that still fits both reference marks.
const MIN_BAR_WIDTH: usize = 10;

/// Styling and reference values for the visual summary.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub title: String,
    pub bar_width: usize,
    pub reference_lines: bool,
    pub colour_bands: bool,
    pub baselines: Baselines,
    pub notes: Vec<BaselineNote>,
}

impl ReporterConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            title: config.report.title.clone(),
            bar_width: config.report.bar_width,
            reference_lines: config.report.reference_lines,
            colour_bands: config.report.colour_bands,
            baselines: config.baseline.to_baselines(),
            notes: config.baseline.notes.clone(),
        }
    }
}

/// Renders reports with a fixed style.
#[derive(Debug, Clone)]
pub struct Reporter {
    config: ReporterConfig,
}

impl Reporter {
    pub fn new(mut config: ReporterConfig) -> Self {
        config.bar_width = config.bar_width.max(MIN_BAR_WIDTH);
        Self { config }
    }

    /// Render the visual summary in `format`.
    pub fn render(&self, report: &Report, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Markdown => Ok(self.render_markdown(report)),
            OutputFormat::Json => generate_json_report(report),
        }
    }

    /// Generate the complete Markdown summary.
    pub fn render_markdown(&self, report: &Report) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", self.config.title));
        output.push_str(&generate_metadata_section(&report.metadata));
        output.push_str(&self.question_panel(&report.questions));

        for (i, panel) in [2, 3].into_iter().enumerate() {
            match report.groups.get(i) {
                Some(group) => output.push_str(&self.group_panel(panel, group)),
                None => output.push_str(&format!(
                    "## Panel {}: Group Comparison\n\nNo group dimension configured.\n\n",
                    panel
                )),
            }
        }

        output.push_str(&self.scorecard(&report.headline));
        output.push_str(&generate_footer());

        output
    }

    /// Panel 1: positive percentage per question, best first.
    fn question_panel(&self, questions: &[QuestionSummary]) -> String {
        let mut section = String::from("## Panel 1: Engagement by Question\n\n");

        if questions.is_empty() {
            section.push_str("Question data not available.\n\n");
            return section;
        }

        let mut ordered = questions.to_vec();
        sort_by_positive(&mut ordered);

        let labels: Vec<String> = ordered
            .iter()
            .map(|q| truncate(&format!("{} {}", q.id, q.description), MAX_LABEL))
            .collect();
        let width = label_width(&labels);

        section.push_str("```text\n");
        for (q, label) in ordered.iter().zip(&labels) {
            let line = match q.result {
                AggregateResult::Scored {
                    pct_positive,
                    n_responses,
                    ..
                } => format!(
                    "{:<width$} {} {:>6.2}% {} (n={})",
                    label,
                    self.bar(pct_positive, true),
                    pct_positive,
                    self.band(pct_positive),
                    n_responses,
                    width = width
                ),
                AggregateResult::NoData => {
                    format!("{:<width$} no data", label, width = width)
                }
            };
            section.push_str(line.trim_end());
            section.push('\n');
        }
        section.push_str("```\n\n");
        section.push_str(&self.legend(true));

        section
    }

    /// Panels 2 and 3: average engagement per group.
    fn group_panel(&self, panel: usize, group: &GroupReport) -> String {
        let mut section = format!("## Panel {}: Engagement by {}\n\n", panel, group.label);

        if !group.available || group.groups.is_empty() {
            section.push_str(&format!("{} data not available.\n\n", group.label));
            return section;
        }

        let labels: Vec<String> = group
            .groups
            .iter()
            .map(|g| truncate(&format!("{} (n={})", g.value, g.n_respondents), MAX_LABEL))
            .collect();
        let width = label_width(&labels);

        section.push_str("```text\n");
        for (g, label) in group.groups.iter().zip(&labels) {
            let line = match g.avg_engagement.value() {
                Some(avg) => format!(
                    "{:<width$} {} {:>6.2}% {}",
                    label,
                    self.bar(avg, false),
                    avg,
                    self.band(avg),
                    width = width
                ),
                None => format!("{:<width$} no data", label, width = width),
            };
            section.push_str(line.trim_end());
            section.push('\n');
        }
        section.push_str("```\n\n");
        section.push_str(&self.legend(false));

        section
    }

    /// Panel 4: textual scorecard.
    fn scorecard(&self, headline: &Headline) -> String {
        let baselines = &self.config.baselines;
        let mut section = String::from("## Panel 4: Summary Scorecard\n\n");

        section.push_str("**Your Organization (Baseline)**\n\n");
        section.push_str(&format!("- Engagement: {}%\n", baselines.engagement));
        section.push_str(&format!("- Turnover: {}%\n", baselines.turnover));
        for note in &self.config.notes {
            section.push_str(&format!("- {}: {}\n", note.label, note.value));
        }
        section.push('\n');

        section.push_str("**Survey Benchmarks**\n\n");
        section.push_str(&format!(
            "- Avg Engagement: {}\n",
            headline.engagement_index.pct()
        ));
        section.push_str(&format!(
            "- Turnover intent: {} (considering leaving)\n\n",
            headline.turnover_intent.pct()
        ));

        section.push_str("**Gap Analysis**\n\n");
        section.push_str(&format!(
            "- Engagement gap: {} percentage points\n",
            headline.gap_to_baseline.signed()
        ));
        if let (Some(target), Some(gap)) = (baselines.target_engagement, &headline.gap_to_target) {
            section.push_str(&format!(
                "- Target: {}% ({} points needed)\n",
                target,
                points_needed(gap)
            ));
        }
        section.push_str(&format!(
            "- Turnover gap: {} percentage points\n\n",
            headline.turnover_gap.signed()
        ));

        section.push_str("**Key Findings**\n\n");
        match (&headline.highest, &headline.lowest) {
            (Some(high), Some(low)) => {
                section.push_str(&format!(
                    "1. Highest engagement area: {} {} ({:.2}%)\n",
                    high.id, high.description, high.pct_positive
                ));
                section.push_str(&format!(
                    "2. Lowest engagement area: {} {} ({:.2}%)\n",
                    low.id, low.description, low.pct_positive
                ));
                section.push_str("3. Priority improvement areas:\n");
                for p in &headline.priorities {
                    section.push_str(&format!("   - {} {}\n", p.id, p.description));
                }
            }
            _ => section.push_str("No question had valid responses.\n"),
        }
        section.push('\n');

        section
    }

    /// A bar for `pct` with optional reference marks.
    fn bar(&self, pct: f64, with_target: bool) -> String {
        let width = self.config.bar_width;
        let mut cells: Vec<char> = (0..width)
            .map(|i| if i < column(pct, width) { FILLED } else { EMPTY })
            .collect();

        if self.config.reference_lines {
            cells[column(self.config.baselines.engagement, width).min(width - 1)] = BASELINE_MARK;
            if with_target {
                if let Some(target) = self.config.baselines.target_engagement {
                    cells[column(target, width).min(width - 1)] = TARGET_MARK;
                }
            }
        }

        cells.into_iter().collect()
    }

    /// Colour marker for `pct` against the baseline and target.
    fn band(&self, pct: f64) -> &'static str {
        if !self.config.colour_bands {
            return "";
        }
        let baselines = &self.config.baselines;
        let upper = baselines.target_engagement.unwrap_or(baselines.engagement);
        if pct < baselines.engagement {
            "🔴"
        } else if pct > upper {
            "🟢"
        } else {
            "🟠"
        }
    }

    fn legend(&self, with_target: bool) -> String {
        if !self.config.reference_lines {
            return String::new();
        }
        let baselines = &self.config.baselines;
        let mut legend = format!(
            "*`{}` your baseline ({}%)",
            BASELINE_MARK, baselines.engagement
        );
        if with_target {
            if let Some(target) = baselines.target_engagement {
                legend.push_str(&format!(" · `{}` your target ({}%)", TARGET_MARK, target));
            }
        }
        legend.push_str("*\n\n");
        legend
    }
}

/// Bar column for a percentage.
fn column(pct: f64, width: usize) -> usize {
    ((pct.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize
}

fn points_needed(gap: &Metric) -> String {
    match gap.value() {
        Some(v) => format!("{:+.2}", -v),
        None => "n/a".to_string(),
    }
}

fn label_width(labels: &[String]) -> usize {
    labels.iter().map(|l| l.chars().count()).max().unwrap_or(0)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Responses:** {} rows × {} columns\n",
        metadata.rows_loaded, metadata.columns_loaded
    ));
    section.push_str(&format!(
        "- **Questions Configured:** {}\n",
        metadata.questions_configured
    ));
    if !metadata.missing_fields.is_empty() {
        section.push_str(&format!(
            "- **Missing Fields:** {}\n",
            metadata.missing_fields.join(", ")
        ));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by SurveyTally*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
