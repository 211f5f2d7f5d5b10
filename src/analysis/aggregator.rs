//! Per-question and grouped aggregation.
//!
//! All percentages and means are rounded to two decimals at the point they
//! are produced, so every downstream figure is derived from what the
//! exports show.

use crate::error::SurveyError;
use crate::models::{
    AggregateResult, GroupDimension, GroupReport, GroupSummary, Metric, Polarity, QuestionSpec,
    QuestionSummary,
};
use crate::table::ResponseTable;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Unweighted mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Aggregate a sequence of optional values under `polarity`.
///
/// Missing values are dropped. An empty remainder is `NoData`.
pub fn aggregate_values<I>(values: I, polarity: Polarity) -> AggregateResult
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut positive = 0usize;

    for value in values.into_iter().flatten() {
        n += 1;
        sum += value;
        if polarity.is_positive(value) {
            positive += 1;
        }
    }

    if n == 0 {
        return AggregateResult::NoData;
    }

    AggregateResult::Scored {
        n_responses: n,
        mean_score: round2(sum / n as f64),
        pct_positive: round2(positive as f64 / n as f64 * 100.0),
    }
}

/// Aggregate a whole derived column for one question.
pub fn aggregate_question(values: &[Option<f64>], question: &QuestionSpec) -> AggregateResult {
    aggregate_values(values.iter().copied(), question.polarity)
}

/// Aggregate only the given row indices of a derived column.
pub fn aggregate_rows(
    values: &[Option<f64>],
    rows: &[usize],
    question: &QuestionSpec,
) -> AggregateResult {
    aggregate_values(
        rows.iter().map(|&r| values.get(r).copied().flatten()),
        question.polarity,
    )
}

/// Overall results for every question with a derived numeric column.
///
/// Questions whose column is absent are skipped.
pub fn summarize_questions(
    table: &ResponseTable,
    questions: &[QuestionSpec],
) -> Vec<QuestionSummary> {
    questions
        .iter()
        .filter_map(|q| {
            let values = table.numeric(&q.id)?;
            Some(QuestionSummary {
                id: q.id.clone(),
                description: q.description.clone(),
                result: aggregate_question(values, q),
            })
        })
        .collect()
}

/// Partition row indices by distinct non-missing value, in first-seen order.
pub fn partition_rows(
    table: &ResponseTable,
    field: &str,
) -> Result<Vec<(String, Vec<usize>)>, SurveyError> {
    let column = table
        .column(field)
        .ok_or_else(|| SurveyError::field_missing(field))?;

    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<(String, Vec<usize>)> = Vec::new();

    for (row, cell) in column.cells().enumerate() {
        let Some(raw) = cell else { continue };
        let key = raw.trim();
        let slot = *positions.entry(key).or_insert_with(|| {
            partitions.push((key.to_string(), Vec::new()));
            partitions.len() - 1
        });
        partitions[slot].1.push(row);
    }

    Ok(partitions)
}

/// Average engagement per group of `dimension`, best first.
pub fn group_by_dimension(
    table: &ResponseTable,
    dimension: &GroupDimension,
    questions: &[QuestionSpec],
) -> Result<GroupReport, SurveyError> {
    let partitions = partition_rows(table, &dimension.field)?;

    let scored: Vec<(&QuestionSpec, &[Option<f64>])> = questions
        .iter()
        .filter_map(|q| table.numeric(&q.id).map(|values| (q, values)))
        .collect();

    let mut groups: Vec<GroupSummary> = partitions
        .into_iter()
        .map(|(value, rows)| {
            let pcts: Vec<f64> = scored
                .iter()
                .filter_map(|(q, values)| aggregate_rows(values, &rows, q).pct_positive())
                .collect();

            let avg_engagement = match mean(&pcts) {
                Some(avg) => Metric::available(round2(avg)),
                None => {
                    debug!("{}={}: no valid responses", dimension.field, value);
                    Metric::unavailable(
                        SurveyError::empty(format!("{} = {}", dimension.field, value)).to_string(),
                    )
                }
            };

            GroupSummary {
                value,
                n_respondents: rows.len(),
                questions_with_data: pcts.len(),
                avg_engagement,
            }
        })
        .collect();

    sort_groups(&mut groups);

    Ok(GroupReport {
        field: dimension.field.clone(),
        label: dimension.label.clone(),
        available: true,
        groups,
    })
}

/// Stable sort: highest engagement first, no-data groups last.
pub fn sort_groups(groups: &mut [GroupSummary]) {
    groups.sort_by(|a, b| {
        match (a.avg_engagement.value(), b.avg_engagement.value()) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

/// Sort question summaries by positive percentage, highest first.
///
/// Stable; questions without data go last.
pub fn sort_by_positive(summaries: &mut [QuestionSummary]) {
    summaries.sort_by(|a, b| match (a.result.pct_positive(), b.result.pct_positive()) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScaleBounds;
    use proptest::prelude::*;

    fn agreement(id: &str) -> QuestionSpec {
        QuestionSpec {
            id: id.to_string(),
            description: format!("Question {}", id),
            scale: Some(ScaleBounds::default()),
            polarity: Polarity::LowerIsPositive { threshold: 2.0 },
        }
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> ResponseTable {
        ResponseTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_question_example() {
        let values = [Some(1.0), Some(2.0), Some(3.0), None];
        let result = aggregate_question(&values, &agreement("Q1"));

        assert_eq!(
            result,
            AggregateResult::Scored {
                n_responses: 3,
                mean_score: 2.0,
                pct_positive: 66.67,
            }
        );
    }

    #[test]
    fn test_all_missing_is_no_data() {
        let values = [None, None, None];
        let result = aggregate_question(&values, &agreement("Q1"));
        assert_eq!(result, AggregateResult::NoData);
        assert_eq!(result.pct_positive(), None);
        assert_eq!(result.mean_score(), None);
    }

    #[test]
    fn test_polarity_preserved() {
        // 5 = Strongly Disagree must never count as positive.
        let values = [Some(5.0), Some(5.0), Some(4.0)];
        let result = aggregate_question(&values, &agreement("Q1"));
        assert_eq!(result.pct_positive(), Some(0.0));
        assert_eq!(result.mean_score(), Some(4.67));
    }

    #[test]
    fn test_matches_code_polarity() {
        let values = [Some(1.0), Some(0.0), Some(1.0), None];
        let result = aggregate_values(values, Polarity::MatchesCode { code: 1.0 });
        assert_eq!(result.pct_positive(), Some(66.67));
        assert_eq!(result.n_responses(), 3);
    }

    #[test]
    fn test_aggregate_rows_subset() {
        let values = [Some(1.0), Some(5.0), Some(2.0), Some(5.0)];
        let result = aggregate_rows(&values, &[0, 2], &agreement("Q1"));
        assert_eq!(result.pct_positive(), Some(100.0));
        assert_eq!(result.n_responses(), 2);

        let empty = aggregate_rows(&values, &[], &agreement("Q1"));
        assert_eq!(empty, AggregateResult::NoData);
    }

    #[test]
    fn test_summarize_skips_missing_columns() {
        let mut t = table(&["Q1"], &[&["1"], &["4"]]);
        t.derive_numeric("Q1", Some(ScaleBounds::default())).unwrap();

        let summaries = summarize_questions(&t, &[agreement("Q1"), agreement("Q2")]);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, "Q1");
        assert_eq!(summaries[0].result.pct_positive(), Some(50.0));
    }

    #[test]
    fn test_group_partition_example() {
        let mut t = table(
            &["Q1", "SIZE"],
            &[
                &["1", "Small"],
                &["2", "Small"],
                &["4", "Large"],
                &["1", "Large"],
                &["5", "Large"],
                &["1", ""],
            ],
        );
        t.derive_numeric("Q1", Some(ScaleBounds::default())).unwrap();
        let dimension = GroupDimension {
            field: "SIZE".to_string(),
            label: "Size".to_string(),
        };

        let report = group_by_dimension(&t, &dimension, &[agreement("Q1")]).unwrap();

        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.grouped_rows(), 5);
        assert_eq!(report.groups[0].value, "Small");
        assert_eq!(report.groups[0].avg_engagement, Metric::available(100.0));
        assert_eq!(report.groups[1].value, "Large");
        assert_eq!(report.groups[1].avg_engagement, Metric::available(33.33));
    }

    #[test]
    fn test_group_averages_question_percentages() {
        let mut t = table(
            &["Q1", "Q2", "G"],
            &[&["1", "5", "A"], &["1", "", "A"], &["3", "2", "B"]],
        );
        t.derive_numeric("Q1", Some(ScaleBounds::default())).unwrap();
        t.derive_numeric("Q2", Some(ScaleBounds::default())).unwrap();
        let dimension = GroupDimension {
            field: "G".to_string(),
            label: "G".to_string(),
        };

        let report =
            group_by_dimension(&t, &dimension, &[agreement("Q1"), agreement("Q2")]).unwrap();

        // A: Q1 100%, Q2 0% -> 50; B: Q1 0%, Q2 100% -> 50. Tie keeps first-seen order.
        assert_eq!(report.groups[0].value, "A");
        assert_eq!(report.groups[0].avg_engagement, Metric::available(50.0));
        assert_eq!(report.groups[0].questions_with_data, 2);
        assert_eq!(report.groups[1].value, "B");
    }

    #[test]
    fn test_group_without_data_reported_last() {
        let mut t = table(
            &["Q1", "G"],
            &[&["", "Empty"], &["4", "Low"], &["1", "High"]],
        );
        t.derive_numeric("Q1", Some(ScaleBounds::default())).unwrap();
        let dimension = GroupDimension {
            field: "G".to_string(),
            label: "G".to_string(),
        };

        let report = group_by_dimension(&t, &dimension, &[agreement("Q1")]).unwrap();

        let values: Vec<&str> = report.groups.iter().map(|g| g.value.as_str()).collect();
        assert_eq!(values, vec!["High", "Low", "Empty"]);
        assert_eq!(report.groups[2].n_respondents, 1);
        assert_eq!(report.groups[2].questions_with_data, 0);
        assert!(report.groups[2].avg_engagement.value().is_none());
    }

    #[test]
    fn test_group_missing_dimension() {
        let t = table(&["Q1"], &[&["1"]]);
        let dimension = GroupDimension {
            field: "DSUPER".to_string(),
            label: "Supervisory status".to_string(),
        };
        let err = group_by_dimension(&t, &dimension, &[agreement("Q1")]).unwrap_err();
        assert!(matches!(err, SurveyError::FieldMissing { .. }));
    }

    #[test]
    fn test_partition_trims_values() {
        let t = table(&["G"], &[&["Small "], &[" Small"], &["NA"]]);
        let partitions = partition_rows(&t, "G").unwrap();
        assert_eq!(partitions, vec![("Small".to_string(), vec![0, 1])]);
    }

    #[test]
    fn test_sort_by_positive() {
        let mut summaries = vec![
            QuestionSummary {
                id: "A".to_string(),
                description: String::new(),
                result: AggregateResult::NoData,
            },
            QuestionSummary {
                id: "B".to_string(),
                description: String::new(),
                result: AggregateResult::Scored {
                    n_responses: 1,
                    mean_score: 3.0,
                    pct_positive: 10.0,
                },
            },
            QuestionSummary {
                id: "C".to_string(),
                description: String::new(),
                result: AggregateResult::Scored {
                    n_responses: 1,
                    mean_score: 1.0,
                    pct_positive: 90.0,
                },
            },
        ];

        sort_by_positive(&mut summaries);
        let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(58.4 - 62.0), -3.6);
        assert_eq!(round2(2.0), 2.0);
    }

    fn response() -> impl Strategy<Value = Option<f64>> {
        prop_oneof![Just(None), (1u8..=5).prop_map(|v| Some(f64::from(v)))]
    }

    proptest! {
        #[test]
        fn prop_bounds_hold(values in prop::collection::vec(response(), 0..200)) {
            let result = aggregate_question(&values, &agreement("Q1"));
            match result {
                AggregateResult::NoData => {
                    prop_assert!(values.iter().all(Option::is_none));
                }
                AggregateResult::Scored { n_responses, mean_score, pct_positive } => {
                    prop_assert_eq!(n_responses, values.iter().flatten().count());
                    prop_assert!((0.0..=100.0).contains(&pct_positive));
                    prop_assert!((1.0..=5.0).contains(&mean_score));
                }
            }
        }

        #[test]
        fn prop_idempotent(values in prop::collection::vec(response(), 0..100)) {
            let q = agreement("Q1");
            prop_assert_eq!(aggregate_question(&values, &q), aggregate_question(&values, &q));
        }

        #[test]
        fn prop_order_independent(values in prop::collection::vec(response(), 1..100)) {
            let q = agreement("Q1");
            let mut reversed = values.clone();
            reversed.reverse();
            prop_assert_eq!(aggregate_question(&values, &q), aggregate_question(&reversed, &q));
        }

        #[test]
        fn prop_partitions_exhaustive(
            cells in prop::collection::vec(
                prop_oneof![Just(""), Just("A"), Just("B"), Just("C")],
                0..100,
            )
        ) {
            let rows: Vec<&[&str]> = cells.iter().map(std::slice::from_ref).collect();
            let t = table(&["G"], &rows);
            let partitions = partition_rows(&t, "G").unwrap();

            let total: usize = partitions.iter().map(|(_, r)| r.len()).sum();
            let non_missing = cells.iter().filter(|c| !c.is_empty()).count();
            prop_assert_eq!(total, non_missing);

            let mut seen: Vec<usize> = partitions.iter().flat_map(|(_, r)| r.clone()).collect();
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), total);
        }
    }
}
