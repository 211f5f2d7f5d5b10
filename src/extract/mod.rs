//! Text and table extraction from PDF reports.
//!
//! Tables are recovered heuristically from the text layout: a run of lines
//! that split into the same number of columns on wide gaps.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Minimum consecutive lines that make a table (header included).
const MIN_TABLE_LINES: usize = 2;
/// Minimum cells per line for a table row.
const MIN_TABLE_CELLS: usize = 2;

/// A table recovered from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTable {
    /// 1-based page number.
    pub page: usize,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Everything extracted from one document.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub pages: Vec<String>,
    pub tables: Vec<ExtractedTable>,
}

impl Extraction {
    /// Build from per-page text and detect tables on each page.
    pub fn from_pages(pages: Vec<String>) -> Self {
        let tables = pages
            .iter()
            .enumerate()
            .flat_map(|(i, page)| detect_tables(page, i + 1))
            .collect();

        Self { pages, tables }
    }

    /// All page text, with a marker line before each page.
    pub fn text_dump(&self) -> String {
        let mut out = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            out.push_str(&format!("--- Page {} ---\n", i + 1));
            out.push_str(page.trim_end());
            out.push_str("\n\n");
        }
        out
    }
}

/// Split a line into cells on tabs or runs of two or more spaces.
pub fn split_cells(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut spaces = 0;

    for c in line.trim().chars() {
        match c {
            '\t' => {
                push_cell(&mut cells, &mut current);
                spaces = 0;
            }
            ' ' => spaces += 1,
            _ => {
                if spaces >= 2 {
                    push_cell(&mut cells, &mut current);
                } else if spaces == 1 {
                    current.push(' ');
                }
                spaces = 0;
                current.push(c);
            }
        }
    }
    push_cell(&mut cells, &mut current);

    cells
}

fn push_cell(cells: &mut Vec<String>, current: &mut String) {
    let cell = current.trim();
    if !cell.is_empty() {
        cells.push(cell.to_string());
    }
    current.clear();
}

/// Find tables in one page of text.
pub fn detect_tables(page_text: &str, page: usize) -> Vec<ExtractedTable> {
    let mut tables = Vec::new();
    let mut run: Vec<Vec<String>> = Vec::new();

    let mut flush = |run: &mut Vec<Vec<String>>| {
        if run.len() >= MIN_TABLE_LINES {
            let mut lines = std::mem::take(run).into_iter();
            if let Some(header) = lines.next() {
                tables.push(ExtractedTable {
                    page,
                    header,
                    rows: lines.collect(),
                });
            }
        }
        run.clear();
    };

    for line in page_text.lines() {
        let cells = split_cells(line);
        let continues = cells.len() >= MIN_TABLE_CELLS
            && run.first().map_or(true, |first| first.len() == cells.len());

        if continues {
            run.push(cells);
        } else {
            flush(&mut run);
            if cells.len() >= MIN_TABLE_CELLS {
                run.push(cells);
            }
        }
    }
    flush(&mut run);

    tables
}

/// Extract text and tables from a PDF file.
pub fn extract_pdf(path: &Path) -> Result<Extraction> {
    info!("Extracting text from {}", path.display());

    let pages = pdf_extract::extract_text_by_pages(path)
        .with_context(|| format!("Failed to extract text from {}", path.display()))?;

    let extraction = Extraction::from_pages(pages);
    debug!(
        "{} pages, {} tables detected",
        extraction.pages.len(),
        extraction.tables.len()
    );

    Ok(extraction)
}

/// Write `<stem>_text.txt` and one `<stem>_table_N.csv` per table.
pub fn write_extraction(extraction: &Extraction, dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::new();

    let text_path = dir.join(format!("{}_text.txt", stem));
    std::fs::write(&text_path, extraction.text_dump())
        .with_context(|| format!("Failed to write {}", text_path.display()))?;
    written.push(text_path);

    for (i, table) in extraction.tables.iter().enumerate() {
        let path = dir.join(format!("{}_table_{}.csv", stem, i + 1));
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        writer.write_record(&table.header)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        debug!("Table {} from page {} -> {}", i + 1, table.page, path.display());
        written.push(path);
    }

    Ok(written)
}
