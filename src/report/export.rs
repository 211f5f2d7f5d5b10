//! Tabular exports of the aggregation results.

use crate::analysis::sort_by_positive;
use crate::models::{GroupReport, QuestionSummary};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Marker written in place of a value when a row has no valid responses.
pub const NO_DATA: &str = "NA";

fn fmt2(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| NO_DATA.to_string())
}

/// File name of the export for one group dimension.
pub fn group_file_name(prefix: &str, field: &str) -> String {
    format!("{}{}.csv", prefix, field.to_lowercase())
}

/// Write the per-question table, sorted by positive percentage descending.
pub fn write_summary_csv<W: Write>(writer: W, questions: &[QuestionSummary]) -> Result<()> {
    let mut ordered = questions.to_vec();
    sort_by_positive(&mut ordered);

    let mut out = csv::Writer::from_writer(writer);
    out.write_record([
        "question",
        "description",
        "pct_positive",
        "mean_score",
        "n_responses",
    ])?;

    for q in &ordered {
        let n = q.result.n_responses().to_string();
        let pct = fmt2(q.result.pct_positive());
        let mean = fmt2(q.result.mean_score());
        out.write_record([
            q.id.as_str(),
            q.description.as_str(),
            pct.as_str(),
            mean.as_str(),
            n.as_str(),
        ])?;
    }

    out.flush()?;
    Ok(())
}

/// Write one dimension's group table in its already-sorted order.
pub fn write_group_csv<W: Write>(writer: W, report: &GroupReport) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([
        "group",
        "avg_engagement",
        "n_respondents",
        "questions_with_data",
    ])?;

    for g in &report.groups {
        out.write_record([
            g.value.clone(),
            fmt2(g.avg_engagement.value()),
            g.n_respondents.to_string(),
            g.questions_with_data.to_string(),
        ])?;
    }

    out.flush()?;
    Ok(())
}

/// Write every tabular export into `dir`, returning the paths written.
///
/// Dimensions whose field is absent produce no file.
pub fn export_tables(
    dir: &Path,
    summary_name: &str,
    group_prefix: &str,
    questions: &[QuestionSummary],
    groups: &[GroupReport],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::new();

    let summary_path = dir.join(summary_name);
    let file = std::fs::File::create(&summary_path)
        .with_context(|| format!("Failed to create {}", summary_path.display()))?;
    write_summary_csv(file, questions)?;
    info!("Wrote {}", summary_path.display());
    written.push(summary_path);

    for group in groups {
        if !group.available {
            debug!("Skipping export for unavailable dimension {}", group.field);
            continue;
        }
        let path = dir.join(group_file_name(group_prefix, &group.field));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_group_csv(file, group)?;
        info!("Wrote {}", path.display());
        written.push(path);
    }

    Ok(written)
}
