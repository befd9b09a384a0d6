//! RIS bibliography import.
//!
//! RIS is a line-oriented export format: each line is a two-character tag,
//! two spaces, a dash, a space, then the value (`AU  - Smith, John`). A record
//! ends with an `ER` line. Journal publishers export hand-search results in this
//! format.
//!
//! Field mapping is done by [`biblib::RisParser`]. Before that, the input is
//! reframed line by line: only lines with the exact `XX  - ` layout count as
//! tags, anything else is folded into the previous field, and records that
//! lack an `ER` terminator are closed.

use crate::error::{Result, SlrError};
use biblib::{Citation, CitationParser, RisParser};
use std::path::Path;
use tracing::{debug, warn};

/// Fields every journal RIS export must carry somewhere in the file.
pub const REQUIRED_TAGS: &[&str] = &["AU", "PY", "AB", "UR"];

/// One RIS record, reduced to the fields the pipeline consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RisRecord {
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub title: String,
    pub abstract_text: Option<String>,
    pub url: Option<String>,
    pub doi: Option<String>,
}

impl From<Citation> for RisRecord {
    fn from(citation: Citation) -> Self {
        let authors = citation
            .authors
            .iter()
            .map(|a| match a.given_name.as_deref() {
                None | Some("") => a.name.clone(),
                Some(given) => format!("{}, {}", a.name, given),
            })
            .collect();

        Self {
            authors,
            year: citation.date.as_ref().map(|d| d.year),
            title: citation.title,
            abstract_text: citation.abstract_text,
            url: citation.urls.into_iter().next(),
            doi: citation.doi,
        }
    }
}

/// Records of one RIS file plus which tags appeared anywhere in it.
#[derive(Debug, Clone, Default)]
pub struct RisFile {
    pub records: Vec<RisRecord>,
    seen_tags: Vec<String>,
}

impl RisFile {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.seen_tags.iter().any(|t| t == tag)
    }

    /// Fail with `MissingColumn` if a required tag never occurs in the file.
    pub fn require_tags(&self, path: &Path, tags: &[&str]) -> Result<()> {
        match tags.iter().find(|tag| !self.has_tag(tag)) {
            Some(tag) => Err(SlrError::MissingColumn {
                path: path.to_path_buf(),
                column: (*tag).to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Tag of a line with the strict `XX  - value` layout. `ER  -` with the
/// trailing space trimmed also counts.
fn strict_tag(line: &str) -> Option<&str> {
    let tag = line.get(..2)?;
    if !tag.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return None;
    }
    match line.get(2..) {
        Some("  -") => Some(tag),
        Some(rest) if rest.starts_with("  - ") => Some(tag),
        _ => None,
    }
}

/// Reframed RIS text and the tags it contains.
struct Framed {
    text: String,
    tags: Vec<String>,
    records: usize,
}

/// Fold wrapped lines into the preceding field and close unterminated records.
fn frame(input: &str) -> Framed {
    let mut lines: Vec<String> = Vec::new();
    let mut tags: Vec<String> = Vec::new();
    let mut in_record = false;
    let mut records = 0;

    for raw_line in input.lines() {
        let line = raw_line.trim_start_matches('\u{feff}').trim_end();
        if line.trim().is_empty() {
            continue;
        }

        let Some(tag) = strict_tag(line) else {
            match lines.last_mut() {
                Some(previous) if in_record => {
                    previous.push(' ');
                    previous.push_str(line.trim());
                }
                _ => debug!(line, "Skipping text outside a RIS record"),
            }
            continue;
        };

        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }

        match tag {
            "TY" => {
                if in_record {
                    warn!("RIS record missing ER terminator, starting new record");
                    lines.push("ER  - ".to_string());
                }
                in_record = true;
                records += 1;
            }
            "ER" => in_record = false,
            _ => {}
        }
        lines.push(line.to_string());
    }

    if in_record {
        warn!("RIS input ended without ER terminator");
        lines.push("ER  - ".to_string());
    }

    let mut text = lines.join("\n");
    text.push('\n');
    Framed { text, tags, records }
}

/// Parse RIS text into records.
pub fn parse(input: &str) -> Result<RisFile> {
    let framed = frame(input);
    if framed.records == 0 {
        return Ok(RisFile {
            records: Vec::new(),
            seen_tags: framed.tags,
        });
    }

    let citations = RisParser::new()
        .parse(&framed.text)
        .map_err(|e| SlrError::Parse(format!("RIS: {}", e)))?;

    debug!(records = citations.len(), "Parsed RIS input");
    Ok(RisFile {
        records: citations.into_iter().map(RisRecord::from).collect(),
        seen_tags: framed.tags,
    })
}

/// Read and parse a RIS file.
pub fn read(path: &Path) -> Result<RisFile> {
    let content = std::fs::read_to_string(path)?;
    parse(&content).map_err(|e| SlrError::Parse(format!("{}: {}", path.display(), e)))
}
