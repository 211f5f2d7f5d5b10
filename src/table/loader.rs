//! Loading response tables from delimited text.

use super::ResponseTable;
use crate::error::SurveyError;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Minimum shape a table must have to be usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableShape {
    pub min_rows: usize,
    pub min_columns: usize,
}

impl Default for TableShape {
    fn default() -> Self {
        Self {
            min_rows: 1,
            min_columns: 1,
        }
    }
}

/// Pick a delimiter from the file extension: tab for `.tsv`/`.tab`, else comma.
pub fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

impl ResponseTable {
    /// Load a table from a file.
    ///
    /// A missing or unreadable file, or one below `shape`, is `DataUnavailable`.
    pub fn from_path(
        path: &Path,
        shape: TableShape,
        delimiter: Option<u8>,
    ) -> Result<Self, SurveyError> {
        let file = File::open(path).map_err(|e| SurveyError::DataUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let delimiter = delimiter.unwrap_or_else(|| delimiter_for(path));
        debug!(
            "Reading {} with delimiter {:?}",
            path.display(),
            delimiter as char
        );

        let table = read_table(BufReader::new(file), shape, delimiter, path)?;
        info!(
            "Loaded {} responses x {} columns from {}",
            table.len(),
            table.column_count(),
            path.display()
        );
        Ok(table)
    }

    /// Load a table from any byte stream.
    pub fn from_reader<R: Read>(
        reader: R,
        shape: TableShape,
        delimiter: u8,
    ) -> Result<Self, SurveyError> {
        read_table(reader, shape, delimiter, &PathBuf::from("<stream>"))
    }
}

fn read_table<R: Read>(
    reader: R,
    shape: TableShape,
    delimiter: u8,
    origin: &Path,
) -> Result<ResponseTable, SurveyError> {
    let unavailable = |reason: String| SurveyError::DataUnavailable {
        path: origin.to_path_buf(),
        reason,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .byte_headers()
        .map_err(|e| unavailable(format!("unreadable header: {}", e)))?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();

    // A completely empty source yields a single empty header field.
    let headers = if headers.len() == 1 && headers[0].trim().is_empty() {
        Vec::new()
    } else {
        headers
    };

    if headers.len() < shape.min_columns {
        return Err(unavailable(format!(
            "expected at least {} columns, found {}",
            shape.min_columns,
            headers.len()
        )));
    }

    let mut rows = Vec::new();
    for record in csv_reader.byte_records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| String::from_utf8_lossy(cell).into_owned())
                .collect(),
        );
    }

    if rows.len() < shape.min_rows {
        return Err(unavailable(format!(
            "expected at least {} rows, found {}",
            shape.min_rows,
            rows.len()
        )));
    }

    Ok(ResponseTable::new(headers, rows))
}
