//! DOI deduplication, screening filters and final ordering.
//!
//! All passes are plain reductions over `Vec<Record>`: they return the kept
//! records together with how many were dropped so the caller can report it.
//! Records with an empty DOI are never considered duplicates of each other.

use crate::doi::doi_key;
use crate::error::Result;
use crate::record::{parse_year, Record, RECORD_COLUMNS};
use crate::table::{cell, Table};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Records kept by a pass and the number it removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pruned {
    pub records: Vec<Record>,
    pub removed: usize,
}

/// Keep one record per DOI, choosing the one whose `search_method` has the
/// lowest priority number; ties go to the earlier record.
///
/// Output is ordered by (priority, input position).
pub fn dedup_by_priority(records: Vec<Record>) -> Pruned {
    let mut winners: HashMap<String, usize> = HashMap::new();

    for (idx, record) in records.iter().enumerate() {
        let Some(key) = doi_key(&record.doi) else {
            continue;
        };
        winners
            .entry(key)
            .and_modify(|winner| {
                if record.search_method.priority() < records[*winner].search_method.priority() {
                    *winner = idx;
                }
            })
            .or_insert(idx);
    }

    let total = records.len();
    let mut kept: Vec<(usize, Record)> = records
        .into_iter()
        .enumerate()
        .filter(|(idx, record)| match doi_key(&record.doi) {
            Some(key) => winners.get(&key) == Some(idx),
            None => true,
        })
        .collect();
    kept.sort_by_key(|(idx, record)| (record.search_method.priority(), *idx));

    let removed = total - kept.len();
    info!(removed, kept = kept.len(), "Priority DOI dedup");

    Pruned {
        records: kept.into_iter().map(|(_, record)| record).collect(),
        removed,
    }
}

/// Drop records whose DOI already appears in `reference`. `reference` is not
/// modified.
pub fn drop_known_dois(batch: Vec<Record>, reference: &[Record]) -> Pruned {
    let known: HashSet<String> = reference.iter().filter_map(|r| doi_key(&r.doi)).collect();

    let total = batch.len();
    let records: Vec<Record> = batch
        .into_iter()
        .filter(|r| doi_key(&r.doi).map_or(true, |key| !known.contains(&key)))
        .collect();

    let removed = total - records.len();
    info!(removed, kept = records.len(), "Cross-batch DOI dedup");

    Pruned { records, removed }
}

/// Year window applied before screening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearWindow {
    /// `year >= n`
    From(i32),
    /// `year < n`
    Before(i32),
}

impl YearWindow {
    fn admits(self, year: Option<i32>) -> bool {
        match (self, year) {
            (YearWindow::From(min), Some(year)) => year >= min,
            (YearWindow::Before(limit), Some(year)) => year < limit,
            (_, None) => false,
        }
    }
}

/// Keep records inside the window. Records without a year are dropped.
pub fn filter_by_year(records: Vec<Record>, window: YearWindow) -> Pruned {
    let total = records.len();
    let records: Vec<Record> = records.into_iter().filter(|r| window.admits(r.year)).collect();
    let removed = total - records.len();
    info!(?window, removed, "Year filter");
    Pruned { records, removed }
}

/// Records of a manually screened sheet, minus rows flagged `is_duplicated == 1`.
pub fn drop_flagged_duplicates(sheet: &Table) -> Result<Pruned> {
    let flag = sheet.column("is_duplicated")?;
    let [authors, year, title, abstract_col, doc_type, doi, link, method] = sheet.columns([
        RECORD_COLUMNS[0],
        RECORD_COLUMNS[1],
        RECORD_COLUMNS[2],
        RECORD_COLUMNS[3],
        RECORD_COLUMNS[4],
        RECORD_COLUMNS[5],
        RECORD_COLUMNS[6],
        RECORD_COLUMNS[7],
    ])?;

    let mut records = Vec::new();
    let mut removed = 0;

    for row in sheet.rows() {
        if parse_year(cell(row, flag)) == Some(1) {
            removed += 1;
            continue;
        }
        records.push(Record {
            authors: cell(row, authors).to_string(),
            year: parse_year(cell(row, year)),
            title: cell(row, title).to_string(),
            abstract_text: cell(row, abstract_col).to_string(),
            document_type: cell(row, doc_type).to_string(),
            doi: cell(row, doi).to_string(),
            link: cell(row, link).to_string(),
            search_method: cell(row, method).parse()?,
        });
    }

    info!(removed, "Manually flagged duplicates removed");
    Ok(Pruned { records, removed })
}

/// Present values ascending, missing values last.
fn missing_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn non_empty(text: &str) -> Option<&str> {
    Some(text).filter(|t| !t.is_empty())
}

fn compare_records(a: &Record, b: &Record) -> Ordering {
    missing_last(non_empty(&a.authors), non_empty(&b.authors))
        .then(missing_last(a.year, b.year))
        .then_with(|| missing_last(non_empty(&a.title), non_empty(&b.title)))
}

/// Sort by (authors, year, title). Missing values (empty authors or title,
/// no year) come after present ones in each column.
pub fn sort_records(records: &mut [Record]) {
    records.sort_by(compare_records);
}
