//! Error taxonomy for the survey pipeline.
//!
//! Only `DataUnavailable` halts a run. `FieldMissing` and `EmptyAggregate`
//! are reported and the affected metric is marked unavailable.

use std::path::PathBuf;

/// Domain errors raised while loading and aggregating a response table.
#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    /// The input source is absent or carries no usable data.
    #[error("data unavailable at {}: {reason}", path.display())]
    DataUnavailable {
        /// Where the table was expected.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// An expected column is not present in the table.
    #[error("field '{field}' not found in the response table")]
    FieldMissing {
        /// Field identifier that was looked up.
        field: String,
    },

    /// A subset had zero valid values to aggregate.
    #[error("no valid responses for {scope}")]
    EmptyAggregate {
        /// Human-readable description of the empty subset.
        scope: String,
    },

    /// Malformed delimited text.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl SurveyError {
    pub fn field_missing(field: impl Into<String>) -> Self {
        Self::FieldMissing {
            field: field.into(),
        }
    }

    pub fn empty(scope: impl Into<String>) -> Self {
        Self::EmptyAggregate {
            scope: scope.into(),
        }
    }

    /// Whether the run must stop on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DataUnavailable { .. } | Self::Csv(_))
    }
}
