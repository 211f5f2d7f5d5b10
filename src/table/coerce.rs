//! Best-effort numeric coercion of raw survey cells.
//!
//! Survey exports routinely contain blanks, skip-codes and stray text.
//! Nothing here fails: unparseable cells become missing.

use crate::models::ScaleBounds;

/// Cell contents treated as missing, after trimming.
pub const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "NULL", "null", "None", "#N/A", "<NA>",
];

/// Whether a raw cell counts as missing.
pub fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    NA_TOKENS.contains(&trimmed)
}

/// Parse a raw cell as a finite number, or `None`.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    if is_missing(raw) {
        return None;
    }
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A derived numeric column plus counts of what was dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercedColumn {
    pub values: Vec<Option<f64>>,
    /// Non-missing cells that did not parse as numbers.
    pub unparseable: usize,
    /// Parsed values outside the expected scale.
    pub out_of_scale: usize,
}

impl CoercedColumn {
    pub fn valid(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Coerce raw cells, dropping values outside `bounds` when given.
pub fn coerce_column<'a, I>(cells: I, bounds: Option<ScaleBounds>) -> CoercedColumn
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut column = CoercedColumn::default();

    for cell in cells {
        let value = match cell {
            None => None,
            Some(raw) => match coerce_numeric(raw) {
                None => {
                    column.unparseable += 1;
                    None
                }
                Some(v) if bounds.is_some_and(|b| !b.contains(v)) => {
                    column.out_of_scale += 1;
                    None
                }
                Some(v) => Some(v),
            },
        };
        column.values.push(value);
    }

    column
}
