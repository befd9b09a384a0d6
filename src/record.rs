//! Canonical record shape shared by every pipeline stage.
//!
//! Every extractor's output is normalized into [`Record`]; the deduplicator and
//! the CSV sink only ever see this type.

use crate::error::SlrError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Column order of every canonical output file.
pub const RECORD_COLUMNS: &[&str] = &[
    "authors",
    "year",
    "title",
    "abstract",
    "document_type",
    "doi",
    "link",
    "search_method",
];

/// Column order of the screening sheet handed to reviewers.
pub const SCREENING_COLUMNS: &[&str] = &[
    "authors",
    "year",
    "title",
    "abstract",
    "is_eligible",
    "document_type",
    "doi",
    "link",
    "search_method",
];

static FOUR_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{4}").expect("four digit pattern is valid"));

/// Provenance tag of a record. Also the key of the dedup priority table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SearchMethod {
    Llba,
    Eric,
    Psycinfo,
    Proquest,
    Ancestry,
    Forward,
    Apa,
    Google,
    /// Hand search of a single journal, e.g. `manual_search[system]`
    ManualSearch(String),
}

impl SearchMethod {
    /// Dedup priority; lower numbers win when two records share a DOI.
    ///
    /// The ordering is a hand-authored trust ranking and is kept as literal
    /// configuration. Manual journal searches rank after every database.
    pub fn priority(&self) -> u8 {
        match self {
            SearchMethod::Llba => 0,
            SearchMethod::Eric => 1,
            SearchMethod::Psycinfo => 2,
            SearchMethod::Proquest => 3,
            SearchMethod::Ancestry => 4,
            SearchMethod::Forward => 5,
            SearchMethod::Apa => 6,
            SearchMethod::Google => 7,
            SearchMethod::ManualSearch(_) => 8,
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMethod::Llba => f.write_str("llba"),
            SearchMethod::Eric => f.write_str("eric"),
            SearchMethod::Psycinfo => f.write_str("psycinfo"),
            SearchMethod::Proquest => f.write_str("proquest"),
            SearchMethod::Ancestry => f.write_str("ancestry"),
            SearchMethod::Forward => f.write_str("forward"),
            SearchMethod::Apa => f.write_str("apa"),
            SearchMethod::Google => f.write_str("google"),
            SearchMethod::ManualSearch(journal) => write!(f, "manual_search[{}]", journal),
        }
    }
}

impl FromStr for SearchMethod {
    type Err = SlrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "llba" => Ok(SearchMethod::Llba),
            "eric" => Ok(SearchMethod::Eric),
            "psycinfo" => Ok(SearchMethod::Psycinfo),
            "proquest" => Ok(SearchMethod::Proquest),
            "ancestry" => Ok(SearchMethod::Ancestry),
            "forward" => Ok(SearchMethod::Forward),
            "apa" => Ok(SearchMethod::Apa),
            "google" => Ok(SearchMethod::Google),
            other => other
                .strip_prefix("manual_search[")
                .and_then(|rest| rest.strip_suffix(']'))
                .filter(|journal| !journal.is_empty())
                .map(|journal| SearchMethod::ManualSearch(journal.to_string()))
                .ok_or_else(|| SlrError::UnknownSource(other.to_string())),
        }
    }
}

impl TryFrom<String> for SearchMethod {
    type Error = SlrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SearchMethod> for String {
    fn from(value: SearchMethod) -> Self {
        value.to_string()
    }
}

/// The canonical bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub authors: String,
    #[serde(deserialize_with = "deserialize_year")]
    pub year: Option<i32>,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub document_type: String,
    pub doi: String,
    pub link: String,
    pub search_method: SearchMethod,
}

/// A canonical record with the reviewer's `is_eligible` column, in the
/// screening sheet column order.
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningRecord {
    pub authors: String,
    pub year: Option<i32>,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub is_eligible: String,
    pub document_type: String,
    pub doi: String,
    pub link: String,
    pub search_method: SearchMethod,
}

impl From<Record> for ScreeningRecord {
    fn from(r: Record) -> Self {
        Self {
            authors: r.authors,
            year: r.year,
            title: r.title,
            abstract_text: r.abstract_text,
            is_eligible: String::new(),
            document_type: r.document_type,
            doi: r.doi,
            link: r.link,
            search_method: r.search_method,
        }
    }
}

/// Parse a year cell. Accepts `2018`, `2018.0` (spreadsheet float export) and
/// blank cells.
pub fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc() as i32)
}

/// Year from an 8-digit `YYYYMMDD` date cell.
pub fn year_from_yyyymmdd(raw: &str) -> Option<i32> {
    parse_year(raw).map(|date| date.div_euclid(10_000))
}

/// First run of four digits anywhere in `text`.
pub fn year_in_text(text: &str) -> Option<i32> {
    FOUR_DIGITS
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

fn deserialize_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_year))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_method_round_trip() {
        for name in ["llba", "google", "manual_search[system]"] {
            let method: SearchMethod = name.parse().expect("known source");
            assert_eq!(method.to_string(), name);
        }
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        let err = "scopus".parse::<SearchMethod>().expect_err("unknown source");
        assert!(matches!(err, SlrError::UnknownSource(name) if name == "scopus"));
        assert!("manual_search[]".parse::<SearchMethod>().is_err());
    }

    #[test]
    fn test_priority_table() {
        let ordered = [
            SearchMethod::Llba,
            SearchMethod::Eric,
            SearchMethod::Psycinfo,
            SearchMethod::Proquest,
            SearchMethod::Ancestry,
            SearchMethod::Forward,
            SearchMethod::Apa,
            SearchMethod::Google,
        ];
        for (expected, method) in ordered.iter().enumerate() {
            assert_eq!(method.priority() as usize, expected);
        }
        assert!(SearchMethod::ManualSearch("system".into()).priority() > SearchMethod::Google.priority());
    }

    #[test]
    fn test_year_from_yyyymmdd() {
        assert_eq!(year_from_yyyymmdd("20180315"), Some(2018));
        assert_eq!(year_from_yyyymmdd("20180315.0"), Some(2018));
        assert_eq!(year_from_yyyymmdd(""), None);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2019"), Some(2019));
        assert_eq!(parse_year("2019.0"), Some(2019));
        assert_eq!(parse_year(" "), None);
        assert_eq!(parse_year("n.d."), None);
    }

    #[test]
    fn test_year_in_text() {
        assert_eq!(year_in_text("J Smith, K Lee - System, 2015 - Elsevier"), Some(2015));
        assert_eq!(year_in_text("no year here"), None);
    }
}
