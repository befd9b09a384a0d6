//! Tabular inputs: CSV/TSV files and Excel workbooks.
//!
//! Database exports (ProQuest, EBSCO), processed stage outputs and screening
//! sheets are all read through [`Table`]. Columns are looked up by header name,
//! and a missing column is fatal: every export format here has a fixed schema.

use crate::error::{Result, SlrError};
use calamine::{open_workbook_auto, Reader};
use csv::{ReaderBuilder, StringRecord};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A header row plus string rows.
#[derive(Debug, Clone)]
pub struct Table {
    path: PathBuf,
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

/// Field delimiter inferred from a file extension: tab for `.tsv`/`.txt`,
/// comma otherwise.
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("txt") => b'\t',
        _ => b',',
    }
}

/// Whether a path names an Excel (or ODS) workbook.
pub fn is_workbook(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("xls" | "xlsx" | "xlsm" | "xlsb" | "ods")
    )
}

impl Table {
    /// Read a table with a header row. Workbooks are read from their first
    /// worksheet; anything else is read as delimited text.
    pub fn read(path: &Path) -> Result<Self> {
        if is_workbook(path) {
            Self::read_workbook(path)
        } else {
            Self::read_delimited(path)
        }
    }

    fn read_delimited(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter_for(path))
            .flexible(true)
            .from_path(path)?;

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim())
            .collect::<StringRecord>();
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(path = %path.display(), rows = rows.len(), "Loaded table");

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    fn read_workbook(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| SlrError::Parse(format!("{} has no worksheet", path.display())))??;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(|c| c.to_string().trim().to_string()).collect::<StringRecord>());
        let headers = rows.next().unwrap_or_default();
        let rows: Vec<StringRecord> = rows.collect();

        debug!(path = %path.display(), rows = rows.len(), "Loaded worksheet");

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    /// Build a table from in-memory rows. `path` is only used in error messages.
    pub fn from_rows(path: impl Into<PathBuf>, headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            path: path.into(),
            headers: headers.iter().copied().collect(),
            rows: rows.into_iter().map(StringRecord::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a named column.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SlrError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }

    /// Indices of several named columns; fails on the first missing one.
    pub fn columns<const N: usize>(&self, names: [&str; N]) -> Result<[usize; N]> {
        let mut indices = [0; N];
        for (slot, name) in indices.iter_mut().zip(names) {
            *slot = self.column(name)?;
        }
        Ok(indices)
    }

    pub fn rows(&self) -> impl Iterator<Item = &StringRecord> {
        self.rows.iter()
    }
}

/// Trimmed cell text; short rows read as empty cells.
pub fn cell(row: &StringRecord, index: usize) -> &str {
    row.get(index).map(str::trim).unwrap_or("")
}
