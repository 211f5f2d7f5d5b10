//! The linear analysis pipeline: coerce, aggregate, group, headline.

use super::aggregator::{group_by_dimension, summarize_questions};
use super::headline::compute_headline;
use crate::models::{Baselines, GroupReport, Headline, QuestionSummary, SurveySpec};
use crate::table::ResponseTable;
use tracing::{debug, info, warn};

/// Everything computed from one table.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub questions: Vec<QuestionSummary>,
    pub groups: Vec<GroupReport>,
    pub headline: Headline,
    /// Configured fields not present in the table.
    pub missing_fields: Vec<String>,
}

/// Presence of one configured field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCheck {
    pub field: String,
    pub role: &'static str,
    pub description: String,
    pub present: bool,
    /// Non-missing cells in the column.
    pub values: usize,
}

/// Report which configured fields the table carries.
pub fn check_fields(table: &ResponseTable, survey: &SurveySpec) -> Vec<FieldCheck> {
    let check = |field: &str, role: &'static str, description: &str| {
        FieldCheck {
            field: field.to_string(),
            role,
            description: description.to_string(),
            present: table.has_field(field),
            values: table.column(field).map_or(0, |c| c.non_missing()),
        }
    };

    let questions = survey
        .questions
        .iter()
        .map(|q| check(&q.id, "question", &q.description));
    let groups = survey
        .groups
        .iter()
        .map(|g| check(&g.field, "group", &g.label));
    let turnover = survey
        .turnover
        .iter()
        .map(|t| check(&t.field, "turnover", &t.description));

    questions.chain(groups).chain(turnover).collect()
}

/// Run the full pipeline over `table`.
///
/// Derived numeric columns are added to the table; nothing else changes.
pub fn analyze(table: &mut ResponseTable, survey: &SurveySpec, baselines: &Baselines) -> Analysis {
    let mut missing_fields = Vec::new();

    for question in &survey.questions {
        match table.derive_numeric(&question.id, question.scale) {
            Ok(valid) => debug!(
                "{}: {} valid responses, positive when {}",
                question.id, valid, question.polarity
            ),
            Err(e) => {
                warn!("{}; question excluded", e);
                missing_fields.push(question.id.clone());
            }
        }
    }

    if let Some(ref turnover) = survey.turnover {
        if let Err(e) = table.derive_numeric(&turnover.field, None) {
            warn!("{}; turnover intent unavailable", e);
            missing_fields.push(turnover.field.clone());
        }
    }

    let questions = summarize_questions(table, &survey.questions);
    info!(
        "Aggregated {} of {} configured questions",
        questions.len(),
        survey.questions.len()
    );

    let groups = survey
        .groups
        .iter()
        .map(|dimension| {
            match group_by_dimension(table, dimension, &survey.questions) {
                Ok(report) => {
                    debug!(
                        "{}: {} groups covering {} of {} rows",
                        dimension.field,
                        report.groups.len(),
                        report.grouped_rows(),
                        table.len()
                    );
                    report
                }
                Err(e) => {
                    warn!("{}; {} comparison unavailable", e, dimension.label);
                    missing_fields.push(dimension.field.clone());
                    GroupReport::unavailable(dimension)
                }
            }
        })
        .collect();

    let headline = compute_headline(&questions, table, survey.turnover.as_ref(), baselines);

    Analysis {
        questions,
        groups,
        headline,
        missing_fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Metric;
    use crate::table::TableShape;
    use std::path::PathBuf;

    fn fixture() -> ResponseTable {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample_responses.csv");
        ResponseTable::from_path(&path, TableShape::default(), None).unwrap()
    }

    #[test]
    fn test_check_fields() {
        let table = fixture();
        let survey = Config::default().survey.to_spec().unwrap();
        let checks = check_fields(&table, &survey);

        let q15 = checks.iter().find(|c| c.field == "Q15").unwrap();
        assert!(!q15.present);
        assert_eq!(q15.values, 0);
        assert_eq!(q15.role, "question");
        let dsuper = checks.iter().find(|c| c.field == "DSUPER").unwrap();
        assert!(dsuper.present);
        assert_eq!(dsuper.values, 11);
        assert_eq!(checks.last().unwrap().role, "turnover");
    }

    #[test]
    fn test_analyze_fixture() {
        let mut table = fixture();
        let config = Config::default();
        let survey = config.survey.to_spec().unwrap();

        let analysis = analyze(&mut table, &survey, &config.baseline.to_baselines());

        // Q15 is configured but absent from the fixture.
        assert_eq!(analysis.missing_fields, vec!["Q15".to_string()]);
        assert_eq!(analysis.questions.len(), 7);

        let q40 = analysis.questions.iter().find(|q| q.id == "Q40").unwrap();
        assert_eq!(q40.result.n_responses(), 11);
        assert_eq!(q40.result.pct_positive(), Some(63.64));

        // "X" in Q12 and "9" in Q14 are dropped by coercion.
        let q12 = analysis.questions.iter().find(|q| q.id == "Q12").unwrap();
        assert_eq!(q12.result.n_responses(), 11);
        let q14 = analysis.questions.iter().find(|q| q.id == "Q14").unwrap();
        assert_eq!(q14.result.n_responses(), 11);

        let size = &analysis.groups[0];
        assert_eq!(size.field, "DAGENCYSZ");
        assert!(size.available);
        assert_eq!(size.groups.len(), 4);
        assert_eq!(size.grouped_rows(), 11);

        let supervisory = &analysis.groups[1];
        assert_eq!(supervisory.groups.len(), 3);
        assert_eq!(supervisory.grouped_rows(), 11);

        assert_eq!(analysis.headline.turnover_intent, Metric::available(36.36));
        assert!(analysis.headline.engagement_index.value().is_some());
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let config = Config::default();
        let survey = config.survey.to_spec().unwrap();
        let baselines = config.baseline.to_baselines();

        let mut first = fixture();
        let mut second = fixture();
        let a = analyze(&mut first, &survey, &baselines);
        let b = analyze(&mut second, &survey, &baselines);
        let again = analyze(&mut first, &survey, &baselines);

        assert_eq!(a.questions, b.questions);
        assert_eq!(a.groups, b.groups);
        assert_eq!(a.headline, again.headline);
    }

    #[test]
    fn test_analyze_missing_dimension() {
        let mut table = ResponseTable::new(
            vec!["Q40".to_string()],
            vec![vec!["1".to_string()], vec!["3".to_string()]],
        );
        let config = Config::default();
        let survey = config.survey.to_spec().unwrap();

        let analysis = analyze(&mut table, &survey, &config.baseline.to_baselines());

        assert!(analysis.groups.iter().all(|g| !g.available));
        assert!(analysis.missing_fields.contains(&"DAGENCYSZ".to_string()));
        assert!(analysis.missing_fields.contains(&"DLEAVING".to_string()));
        assert_eq!(analysis.headline.engagement_index, Metric::available(50.0));
        assert!(analysis.headline.turnover_intent.value().is_none());
    }
}
