//! APA citation string parsing.
//!
//! Some seed papers only publish their reference list as formatted APA text.
//! Those lists are saved one citation per line (tab-separated, first column)
//! and split here into authors, year, title and DOI with fixed rules:
//!
//! - authors: text before the first `(`
//! - year: four digits directly after a `(`
//! - title: text between the first `).` and the next `.`
//! - DOI: whatever follows the last `doi.org/`

use crate::error::{Result, SlrError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static YEAR_IN_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([0-9]{4}).*?\)").expect("APA year pattern is valid"));

/// A citation string and the fields recovered from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApaCitation {
    pub apa: String,
    pub authors: String,
    pub year: String,
    pub title: String,
    pub doi: String,
}

impl ApaCitation {
    /// Parse one APA citation.
    ///
    /// A citation without a `).` after the year has no recoverable title and
    /// is rejected.
    pub fn parse(apa: &str) -> Result<Self> {
        let apa = apa.trim();
        let title = extract_title(apa)
            .ok_or_else(|| SlrError::Parse(format!("APA citation has no '(year).' segment: {}", apa)))?;

        Ok(Self {
            apa: apa.to_string(),
            authors: extract_authors(apa),
            year: extract_year(apa),
            title,
            doi: extract_doi(apa),
        })
    }
}

pub fn extract_authors(apa: &str) -> String {
    apa.split('(').next().unwrap_or("").trim().to_string()
}

pub fn extract_year(apa: &str) -> String {
    YEAR_IN_PARENS
        .captures(apa)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Initials in the author list contain periods, so the title is cut from the
/// segment after the year only.
pub fn extract_title(apa: &str) -> Option<String> {
    let (_, after_year) = apa.split_once(").")?;
    let title = after_year.split('.').next().unwrap_or("");
    Some(title.trim().to_string())
}

pub fn extract_doi(apa: &str) -> String {
    if !apa.contains("doi.org") {
        return String::new();
    }
    apa.rsplit("doi.org/").next().unwrap_or("").trim().to_string()
}

/// Read a tab-separated citation list (no header, citation in the first
/// column) and parse every non-blank line.
pub fn read_citation_list(path: &Path) -> Result<Vec<ApaCitation>> {
    let content = std::fs::read_to_string(path)?;
    let mut citations = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let apa = line.split('\t').next().unwrap_or("").trim();
        if apa.is_empty() {
            continue;
        }
        let citation = ApaCitation::parse(apa).map_err(|e| {
            warn!(path = %path.display(), line = line_no + 1, "Unparseable APA citation");
            SlrError::Parse(format!("{}:{}: {}", path.display(), line_no + 1, e))
        })?;
        citations.push(citation);
    }

    debug!(path = %path.display(), count = citations.len(), "Parsed APA citation list");
    Ok(citations)
}
