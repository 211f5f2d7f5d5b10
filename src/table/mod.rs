//! In-memory response table.
//!
//! Raw cells are kept as loaded. Numeric views are derived per field and
//! stored next to the raw columns; originals are never overwritten.

pub mod coerce;
pub mod loader;

pub use coerce::{coerce_column, is_missing};
pub use loader::TableShape;

use crate::error::SurveyError;
use crate::models::ScaleBounds;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A loaded table of survey responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseTable {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
    numeric: HashMap<String, Vec<Option<f64>>>,
}

/// Read-only view of one raw column.
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    position: usize,
    rows: &'a [Vec<String>],
}

impl<'a> Column<'a> {
    /// Raw cell for `row`, or `None` when missing.
    #[allow(dead_code)] // Row access; the pipeline reads whole columns
    pub fn get(&self, row: usize) -> Option<&'a str> {
        self.rows
            .get(row)
            .map(|r| r[self.position].as_str())
            .filter(|cell| !is_missing(cell))
    }

    /// All cells in row order, missing ones as `None`.
    pub fn cells(&self) -> impl Iterator<Item = Option<&'a str>> + 'a {
        let position = self.position;
        self.rows.iter().map(move |r| {
            let cell = r[position].as_str();
            (!is_missing(cell)).then_some(cell)
        })
    }

    pub fn non_missing(&self) -> usize {
        self.cells().filter(Option::is_some).count()
    }
}

impl ResponseTable {
    /// Build a table from headers and rows.
    ///
    /// Duplicate headers become `NAME.1`, `NAME.2`, ...; short rows are padded
    /// with empty cells and extra cells are dropped.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers = dedupe_headers(headers);
        let width = headers.len();

        let mut truncated = 0usize;
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|mut row| {
                if row.len() > width {
                    truncated += 1;
                }
                row.resize(width, String::new());
                row
            })
            .collect();

        if truncated > 0 {
            debug!("{} rows had more cells than headers; extras dropped", truncated);
        }

        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();

        Self {
            headers,
            index,
            rows,
            numeric: HashMap::new(),
        }
    }

    /// Number of response rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.index.contains_key(field)
    }

    /// Look up a raw column; absent fields yield `None`.
    pub fn column(&self, field: &str) -> Option<Column<'_>> {
        self.index.get(field).map(|&position| Column {
            position,
            rows: &self.rows,
        })
    }

    /// Derive and store a numeric view of `field`.
    ///
    /// Returns the number of valid values.
    pub fn derive_numeric(
        &mut self,
        field: &str,
        bounds: Option<ScaleBounds>,
    ) -> Result<usize, SurveyError> {
        let column = self
            .column(field)
            .ok_or_else(|| SurveyError::field_missing(field))?;
        let coerced = coerce_column(column.cells(), bounds);

        if coerced.unparseable > 0 || coerced.out_of_scale > 0 {
            debug!(
                "{}: {} unparseable, {} out of scale, treated as missing",
                field, coerced.unparseable, coerced.out_of_scale
            );
        }

        let valid = coerced.valid();
        self.numeric.insert(field.to_string(), coerced.values);
        Ok(valid)
    }

    /// Previously derived numeric view of `field`.
    pub fn numeric(&self, field: &str) -> Option<&[Option<f64>]> {
        self.numeric.get(field).map(Vec::as_slice)
    }
}

fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    let mut first_use: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(headers.len());

    for header in headers {
        let name = header.trim().to_string();
        if first_use.insert(name.clone()) {
            out.push(name);
            continue;
        }

        let counter = seen.entry(name.clone()).or_insert(0);
        let renamed = loop {
            *counter += 1;
            let candidate = format!("{}.{}", name, counter);
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        debug!("Duplicate column '{}' renamed to '{}'", name, renamed);
        taken.insert(renamed.clone());
        out.push(renamed);
    }

    out
}
