//! Headline metrics derived from the per-question results.

use super::aggregator::{aggregate_values, mean, round2, sort_by_positive};
use crate::error::SurveyError;
use crate::models::{Baselines, Headline, Highlight, Metric, QuestionSummary, TurnoverSpec};
use crate::table::ResponseTable;
use tracing::warn;

/// Number of lowest-scoring questions flagged as priorities.
const PRIORITY_COUNT: usize = 2;

/// Unweighted mean of positive percentages over questions with data.
pub fn engagement_index(summaries: &[QuestionSummary]) -> Result<f64, SurveyError> {
    let pcts: Vec<f64> = summaries
        .iter()
        .filter_map(|s| s.result.pct_positive())
        .collect();

    mean(&pcts)
        .map(round2)
        .ok_or_else(|| SurveyError::empty("engagement index"))
}

/// Percentage of valid turnover responses coded as affirmative.
///
/// Reads the numeric view derived for the turnover field.
pub fn turnover_rate(table: &ResponseTable, turnover: &TurnoverSpec) -> Result<f64, SurveyError> {
    let values = table
        .numeric(&turnover.field)
        .ok_or_else(|| SurveyError::field_missing(&turnover.field))?;

    aggregate_values(values.iter().copied(), turnover.polarity)
        .pct_positive()
        .ok_or_else(|| SurveyError::empty(format!("turnover field {}", turnover.field)))
}

/// Signed gap in points, rounded to two decimals.
pub fn gap(value: &Metric, baseline: f64) -> Metric {
    value.map(|v| round2(v - baseline))
}

fn to_metric(result: Result<f64, SurveyError>) -> Metric {
    match result {
        Ok(value) => Metric::available(value),
        Err(e) => {
            warn!("{}", e);
            Metric::unavailable(e.to_string())
        }
    }
}

/// Compute every headline metric.
pub fn compute_headline(
    summaries: &[QuestionSummary],
    table: &ResponseTable,
    turnover: Option<&TurnoverSpec>,
    baselines: &Baselines,
) -> Headline {
    let engagement_index = to_metric(engagement_index(summaries));
    let gap_to_baseline = gap(&engagement_index, baselines.engagement);
    let gap_to_target = baselines
        .target_engagement
        .map(|target| gap(&engagement_index, target));

    let turnover_intent = match turnover {
        Some(spec) => to_metric(turnover_rate(table, spec)),
        None => Metric::unavailable("no turnover field configured"),
    };
    let turnover_gap = gap(&turnover_intent, baselines.turnover);

    let mut ranked: Vec<QuestionSummary> = summaries
        .iter()
        .filter(|s| s.result.has_data())
        .cloned()
        .collect();
    sort_by_positive(&mut ranked);

    let highlights: Vec<Highlight> = ranked
        .iter()
        .filter_map(|s| {
            s.result.pct_positive().map(|pct_positive| Highlight {
                id: s.id.clone(),
                description: s.description.clone(),
                pct_positive,
            })
        })
        .collect();

    let priorities = highlights
        .iter()
        .rev()
        .take(PRIORITY_COUNT)
        .cloned()
        .collect();

    Headline {
        engagement_index,
        gap_to_baseline,
        gap_to_target,
        turnover_intent,
        turnover_gap,
        highest: highlights.first().cloned(),
        lowest: highlights.last().cloned(),
        priorities,
    }
}
