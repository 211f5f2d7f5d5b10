//! Data models for the survey aggregator.
//!
//! This module contains the core data structures used throughout
//! the application: question and grouping specs, aggregate results,
//! headline metrics and the assembled report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a numeric response maps onto "positive".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Polarity {
    /// Ordinal agreement scale: values at or below the threshold are positive.
    LowerIsPositive { threshold: f64 },
    /// Coded field: only the exact code counts as affirmative.
    MatchesCode { code: f64 },
}

impl Polarity {
    pub fn is_positive(&self, value: f64) -> bool {
        match *self {
            Polarity::LowerIsPositive { threshold } => value <= threshold,
            Polarity::MatchesCode { code } => value == code,
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::LowerIsPositive { threshold } => write!(f, "<= {}", threshold),
            Polarity::MatchesCode { code } => write!(f, "== {}", code),
        }
    }
}

/// Inclusive numeric domain of a scored field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleBounds {
    pub min: f64,
    pub max: f64,
}

impl ScaleBounds {
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl Default for ScaleBounds {
    fn default() -> Self {
        Self { min: 1.0, max: 5.0 }
    }
}

/// A scored survey question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionSpec {
    /// Column identifier in the response table (e.g. `Q40`).
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Values outside the bounds are treated as missing.
    pub scale: Option<ScaleBounds>,
    pub polarity: Polarity,
}

/// A categorical field used to partition respondents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDimension {
    pub field: String,
    pub label: String,
}

/// The turnover-intent field and its affirmative code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnoverSpec {
    pub field: String,
    pub description: String,
    pub polarity: Polarity,
}

/// Everything the pipeline needs to know about the survey layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveySpec {
    pub questions: Vec<QuestionSpec>,
    pub groups: Vec<GroupDimension>,
    pub turnover: Option<TurnoverSpec>,
}

/// Baseline constants used for display-time gaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baselines {
    pub engagement: f64,
    pub turnover: f64,
    pub target_engagement: Option<f64>,
}

/// Result of aggregating one question over a set of rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AggregateResult {
    /// Zero valid responses; never reported as a numeric zero.
    NoData,
    Scored {
        n_responses: usize,
        mean_score: f64,
        pct_positive: f64,
    },
}

impl AggregateResult {
    pub fn n_responses(&self) -> usize {
        match self {
            AggregateResult::NoData => 0,
            AggregateResult::Scored { n_responses, .. } => *n_responses,
        }
    }

    pub fn pct_positive(&self) -> Option<f64> {
        match self {
            AggregateResult::NoData => None,
            AggregateResult::Scored { pct_positive, .. } => Some(*pct_positive),
        }
    }

    pub fn mean_score(&self) -> Option<f64> {
        match self {
            AggregateResult::NoData => None,
            AggregateResult::Scored { mean_score, .. } => Some(*mean_score),
        }
    }

    pub fn has_data(&self) -> bool {
        matches!(self, AggregateResult::Scored { .. })
    }
}

/// A headline value that may be unavailable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Metric {
    Available { value: f64 },
    Unavailable { reason: String },
}

impl Metric {
    pub fn available(value: f64) -> Self {
        Metric::Available { value }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Metric::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Available { value } => Some(*value),
            Metric::Unavailable { .. } => None,
        }
    }

    /// Apply `f` to an available value, propagating unavailability.
    pub fn map(&self, f: impl FnOnce(f64) -> f64) -> Metric {
        match self {
            Metric::Available { value } => Metric::available(f(*value)),
            Metric::Unavailable { reason } => Metric::unavailable(reason.clone()),
        }
    }

    /// Format as a percentage, or `n/a`.
    pub fn pct(&self) -> String {
        match self.value() {
            Some(v) => format!("{:.2}%", v),
            None => "n/a".to_string(),
        }
    }

    /// Format as a signed number of points, or `n/a`.
    pub fn signed(&self) -> String {
        match self.value() {
            Some(v) => format!("{:+.2}", v),
            None => "n/a".to_string(),
        }
    }
}

/// Overall aggregate for one configured question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionSummary {
    pub id: String,
    pub description: String,
    pub result: AggregateResult,
}

/// One partition of a group dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    /// Raw dimension value shared by every row in the partition.
    pub value: String,
    pub n_respondents: usize,
    /// Number of questions with at least one valid response in this group.
    pub questions_with_data: usize,
    pub avg_engagement: Metric,
}

/// Grouped aggregation for one dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub field: String,
    pub label: String,
    /// `false` when the dimension column is absent from the table.
    pub available: bool,
    /// Sorted descending by average engagement; no-data groups last.
    pub groups: Vec<GroupSummary>,
}

impl GroupReport {
    pub fn unavailable(dimension: &GroupDimension) -> Self {
        Self {
            field: dimension.field.clone(),
            label: dimension.label.clone(),
            available: false,
            groups: Vec::new(),
        }
    }

    /// Total rows assigned to some group.
    pub fn grouped_rows(&self) -> usize {
        self.groups.iter().map(|g| g.n_respondents).sum()
    }
}

/// A question called out in the scorecard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    pub id: String,
    pub description: String,
    pub pct_positive: f64,
}

/// Derived headline metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub engagement_index: Metric,
    pub gap_to_baseline: Metric,
    pub gap_to_target: Option<Metric>,
    pub turnover_intent: Metric,
    pub turnover_gap: Metric,
    pub highest: Option<Highlight>,
    pub lowest: Option<Highlight>,
    /// The lowest-scoring questions, worst first.
    pub priorities: Vec<Highlight>,
}

/// Metadata about the analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Path of the response table.
    pub source: String,
    pub analysis_date: DateTime<Utc>,
    pub rows_loaded: usize,
    pub columns_loaded: usize,
    pub questions_configured: usize,
    /// Configured fields absent from the table.
    pub missing_fields: Vec<String>,
    pub baselines: Baselines,
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Per-question results, in configured order.
    pub questions: Vec<QuestionSummary>,
    pub groups: Vec<GroupReport>,
    pub headline: Headline,
}
