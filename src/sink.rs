//! CSV output and read-back of stage files.
//!
//! Every stage writes a header row in a fixed column order even when it has no
//! rows. The screening sheet is written as UTF-16 so it opens correctly in
//! spreadsheet tools that mangle UTF-8 without a BOM.

use crate::apa::ApaCitation;
use crate::error::Result;
use crate::gscholar::GoogleScholarHit;
use crate::journal_scrape::ScrapedArticle;
use crate::record::{Record, ScreeningRecord, RECORD_COLUMNS, SCREENING_COLUMNS};
use crate::semanticscholar::CitationRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Text encoding of an output file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// Little-endian with a byte order mark
    Utf16,
}

/// A row type with a fixed header. Field order must match `COLUMNS`.
pub trait CsvRow: Serialize {
    const COLUMNS: &'static [&'static str];
}

impl CsvRow for Record {
    const COLUMNS: &'static [&'static str] = RECORD_COLUMNS;
}

impl CsvRow for ScreeningRecord {
    const COLUMNS: &'static [&'static str] = SCREENING_COLUMNS;
}

impl CsvRow for CitationRecord {
    const COLUMNS: &'static [&'static str] = &["authors", "year", "title", "abstract", "corpus_id", "doi"];
}

impl CsvRow for GoogleScholarHit {
    const COLUMNS: &'static [&'static str] = &["title", "publication_info", "link"];
}

impl CsvRow for ApaCitation {
    const COLUMNS: &'static [&'static str] = &["apa", "authors", "year", "title", "doi"];
}

impl CsvRow for ScrapedArticle {
    const COLUMNS: &'static [&'static str] = &["authors", "title", "year", "abstract", "doi", "link"];
}

/// Serialize rows to CSV bytes in the given encoding.
pub fn encode_rows<T: CsvRow>(rows: &[T], encoding: TextEncoding) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    wtr.write_record(T::COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    let utf8 = wtr
        .into_inner()
        .map_err(|e| std::io::Error::new(e.error().kind(), e.error().to_string()))?;

    Ok(match encoding {
        TextEncoding::Utf8 => utf8,
        TextEncoding::Utf16 => {
            let text = String::from_utf8_lossy(&utf8);
            let mut bytes = Vec::with_capacity(2 + utf8.len() * 2);
            bytes.extend_from_slice(&[0xFF, 0xFE]);
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            bytes
        }
    })
}

/// Write rows to `path`, creating parent directories.
pub fn write_rows<T: CsvRow>(path: &Path, rows: &[T], encoding: TextEncoding) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, encode_rows(rows, encoding)?)?;
    info!(path = %path.display(), rows = rows.len(), ?encoding, "Saved CSV");
    Ok(())
}

/// Read a UTF-8 CSV written by an earlier stage.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let rows = rdr.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(rows)
}

/// Read a canonical record file.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    read_rows(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SearchMethod;
    use tempfile::tempdir;

    fn sample() -> Record {
        Record {
            authors: "Taguchi, N.".into(),
            year: Some(2015),
            title: "Instructed pragmatics, revisited".into(),
            abstract_text: String::new(),
            document_type: String::new(),
            doi: "10.1017/S0261444815000263".into(),
            link: "https://doi.org/10.1017/S0261444815000263".into(),
            search_method: SearchMethod::ManualSearch("language_teaching".into()),
        }
    }

    #[test]
    fn test_header_written_for_empty_output() -> Result<()> {
        let bytes = encode_rows::<Record>(&[], TextEncoding::Utf8)?;
        assert_eq!(
            String::from_utf8_lossy(&bytes),
            "authors,year,title,abstract,document_type,doi,link,search_method\n"
        );
        Ok(())
    }

    #[test]
    fn test_records_read_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out/records.csv");
        let mut undated = sample();
        undated.year = None;
        undated.search_method = SearchMethod::Google;

        write_rows(&path, &[sample(), undated.clone()], TextEncoding::Utf8)?;
        let loaded = read_records(&path)?;
        assert_eq!(loaded, vec![sample(), undated]);
        Ok(())
    }

    #[test]
    fn test_screening_sheet_is_utf16() -> Result<()> {
        let bytes = encode_rows(&[ScreeningRecord::from(sample())], TextEncoding::Utf16)?;
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);

        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let text = String::from_utf16(&units).expect("valid UTF-16");
        assert!(text.starts_with("authors,year,title,abstract,is_eligible,document_type"));
        assert!(text.contains("manual_search[language_teaching]"));
        Ok(())
    }
}
