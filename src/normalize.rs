//! Schema normalization.
//!
//! Every source decodes a different column convention. [`SourceBatch`] has one
//! variant per known source, and [`SourceBatch::normalize`] is an exhaustive
//! match over them, so a new source cannot be added without its transform.
//! Each record coming out is stamped with its source's [`SearchMethod`] and
//! carries a prefix-free DOI.

use crate::apa::ApaCitation;
use crate::doi::{doi_link, normalize_doi};
use crate::error::Result;
use crate::gscholar::GoogleScholarHit;
use crate::journal_scrape::ScrapedArticle;
use crate::record::{parse_year, year_from_yyyymmdd, year_in_text, Record, SearchMethod};
use crate::ris::{RisFile, REQUIRED_TAGS};
use crate::semanticscholar::CitationRecord;
use crate::table::{cell, Table};
use std::path::PathBuf;
use tracing::debug;

/// EBSCO export columns: title, abstract, date, authors, document type, doi, link.
const EBSCO_COLUMNS: [&str; 7] = [
    "title",
    "abstract",
    "publicationDate",
    "contributors",
    "docTypes",
    "doi",
    "plink",
];

/// Export format of a hand-searched journal.
#[derive(Debug, Clone)]
pub enum JournalExport {
    /// RIS file; `path` is kept for error messages
    Ris { path: PathBuf, file: RisFile },
    /// ProQuest-style spreadsheet export
    ProquestStyle(Table),
    /// EBSCO-style spreadsheet export
    EbscoStyle(Table),
    /// Freshly scraped search pages
    Scraped(Vec<ScrapedArticle>),
    /// Records that were already normalized by an earlier stage
    Normalized(Vec<Record>),
}

/// Raw rows of one source, tagged by source.
#[derive(Debug, Clone)]
pub enum SourceBatch {
    Llba(Table),
    Eric(Table),
    Psycinfo(Table),
    /// ProQuest Dissertations & Theses; its export has no DOI column
    Proquest(Table),
    Ancestry(Vec<CitationRecord>),
    Forward(Vec<CitationRecord>),
    Apa(Vec<ApaCitation>),
    Google(Vec<GoogleScholarHit>),
    Journal { journal: String, export: JournalExport },
}

impl SourceBatch {
    pub fn search_method(&self) -> SearchMethod {
        match self {
            SourceBatch::Llba(_) => SearchMethod::Llba,
            SourceBatch::Eric(_) => SearchMethod::Eric,
            SourceBatch::Psycinfo(_) => SearchMethod::Psycinfo,
            SourceBatch::Proquest(_) => SearchMethod::Proquest,
            SourceBatch::Ancestry(_) => SearchMethod::Ancestry,
            SourceBatch::Forward(_) => SearchMethod::Forward,
            SourceBatch::Apa(_) => SearchMethod::Apa,
            SourceBatch::Google(_) => SearchMethod::Google,
            SourceBatch::Journal { journal, .. } => SearchMethod::ManualSearch(journal.clone()),
        }
    }

    /// Map every raw row onto the canonical record shape.
    pub fn normalize(self) -> Result<Vec<Record>> {
        let method = self.search_method();

        let records = match self {
            SourceBatch::Llba(table) | SourceBatch::Eric(table) => proquest_rows(&table, true, &method)?,
            SourceBatch::Proquest(table) => proquest_rows(&table, false, &method)?,
            SourceBatch::Psycinfo(table) => ebsco_rows(&table, &method)?,
            SourceBatch::Ancestry(rows) | SourceBatch::Forward(rows) => citation_rows(rows, &method),
            SourceBatch::Apa(rows) => apa_rows(rows, &method),
            SourceBatch::Google(rows) => google_rows(rows, &method),
            SourceBatch::Journal { export, .. } => match export {
                JournalExport::Ris { path, file } => {
                    file.require_tags(&path, REQUIRED_TAGS)?;
                    ris_rows(file, &method)
                }
                JournalExport::ProquestStyle(table) => proquest_rows(&table, true, &method)?,
                JournalExport::EbscoStyle(table) => ebsco_rows(&table, &method)?,
                JournalExport::Scraped(rows) => scraped_rows(rows, &method),
                JournalExport::Normalized(rows) => rows
                    .into_iter()
                    .map(|r| Record {
                        doi: normalize_doi(&r.doi),
                        search_method: method.clone(),
                        ..r
                    })
                    .collect(),
            },
        };

        debug!(source = %method, count = records.len(), "Normalized batch");
        Ok(records)
    }
}

/// ProQuest-style exports (LLBA, ERIC, ProQuest D&T, several journals).
///
/// Columns: `Title, Abstract, Authors, digitalObjectIdentifier, documentType, year, DocumentURL`.
fn proquest_rows(table: &Table, has_doi: bool, method: &SearchMethod) -> Result<Vec<Record>> {
    let [title, abstract_col, authors, doc_type, year, link] =
        table.columns(["Title", "Abstract", "Authors", "documentType", "year", "DocumentURL"])?;
    let doi = if has_doi {
        Some(table.column("digitalObjectIdentifier")?)
    } else {
        None
    };

    Ok(table
        .rows()
        .map(|row| Record {
            authors: cell(row, authors).to_string(),
            year: parse_year(cell(row, year)),
            title: cell(row, title).to_string(),
            abstract_text: cell(row, abstract_col).to_string(),
            document_type: cell(row, doc_type).to_string(),
            doi: doi.map(|i| normalize_doi(cell(row, i))).unwrap_or_default(),
            link: cell(row, link).to_string(),
            search_method: method.clone(),
        })
        .collect())
}

/// EBSCO-style exports (PsycINFO, some journals). Dates are `YYYYMMDD`.
fn ebsco_rows(table: &Table, method: &SearchMethod) -> Result<Vec<Record>> {
    let [title, abstract_col, date, contributors, doc_types, doi, plink] = table.columns(EBSCO_COLUMNS)?;

    Ok(table
        .rows()
        .map(|row| Record {
            authors: cell(row, contributors).to_string(),
            year: year_from_yyyymmdd(cell(row, date)),
            title: cell(row, title).to_string(),
            abstract_text: cell(row, abstract_col).to_string(),
            document_type: cell(row, doc_types).to_string(),
            doi: normalize_doi(cell(row, doi)),
            link: cell(row, plink).to_string(),
            search_method: method.clone(),
        })
        .collect())
}

/// Semantic Scholar rows. Placeholder rows (lookup failures) are dropped.
fn citation_rows(rows: Vec<CitationRecord>, method: &SearchMethod) -> Vec<Record> {
    rows.into_iter()
        .filter(|r| !(r.authors.is_empty() && r.year.is_none() && r.title.is_empty()))
        .map(|r| {
            let doi = normalize_doi(&r.doi);
            Record {
                authors: r.authors,
                year: r.year,
                title: r.title,
                abstract_text: r.abstract_text,
                document_type: String::new(),
                link: doi_link(&doi),
                doi,
                search_method: method.clone(),
            }
        })
        .collect()
}

fn apa_rows(rows: Vec<ApaCitation>, method: &SearchMethod) -> Vec<Record> {
    rows.into_iter()
        .map(|c| {
            let doi = normalize_doi(&c.doi);
            Record {
                authors: c.authors,
                year: parse_year(&c.year),
                title: c.title,
                abstract_text: String::new(),
                document_type: String::new(),
                link: doi_link(&doi),
                doi,
                search_method: method.clone(),
            }
        })
        .collect()
}

/// Authors are the summary text before the first `-`; the year is the first
/// four-digit run of the summary.
fn google_rows(rows: Vec<GoogleScholarHit>, method: &SearchMethod) -> Vec<Record> {
    rows.into_iter()
        .map(|hit| Record {
            authors: hit.publication_info.split('-').next().unwrap_or("").trim().to_string(),
            year: year_in_text(&hit.publication_info),
            title: hit.title,
            abstract_text: String::new(),
            document_type: String::new(),
            doi: String::new(),
            link: hit.link,
            search_method: method.clone(),
        })
        .collect()
}

/// RIS authors are joined with a single space; missing author lists become "".
fn ris_rows(file: RisFile, method: &SearchMethod) -> Vec<Record> {
    file.records
        .into_iter()
        .map(|r| Record {
            authors: r.authors.join(" "),
            year: r.year,
            title: r.title,
            abstract_text: r.abstract_text.unwrap_or_default(),
            document_type: String::new(),
            doi: normalize_doi(r.doi.as_deref().unwrap_or("")),
            link: r.url.unwrap_or_default(),
            search_method: method.clone(),
        })
        .collect()
}

fn scraped_rows(rows: Vec<ScrapedArticle>, method: &SearchMethod) -> Vec<Record> {
    rows.into_iter()
        .map(|a| {
            let doi = normalize_doi(&a.doi);
            let link = if a.link.is_empty() { doi_link(&doi) } else { a.link };
            Record {
                authors: a.authors,
                year: a.year,
                title: a.title,
                abstract_text: a.abstract_text,
                document_type: String::new(),
                doi,
                link,
                search_method: method.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlrError;
    use crate::ris;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn test_ebsco_year_and_renames() -> Result<()> {
        let table = Table::from_rows(
            "PsycINFO_result.csv",
            &EBSCO_COLUMNS,
            vec![vec![
                s("Apologies in L2"),
                s("Abstract"),
                s("20180315"),
                s("Kim, H."),
                s("Journal Article"),
                s("https://doi.org/10.1/ABC"),
                s("https://search.ebscohost.com/x"),
            ]],
        );

        let records = SourceBatch::Psycinfo(table).normalize()?;
        let r = &records[0];
        assert_eq!(r.year, Some(2018));
        assert_eq!(r.authors, "Kim, H.");
        assert_eq!(r.document_type, "Journal Article");
        assert_eq!(r.doi, "10.1/ABC");
        assert_eq!(r.link, "https://search.ebscohost.com/x");
        assert_eq!(r.search_method, SearchMethod::Psycinfo);
        Ok(())
    }

    #[test]
    fn test_proquest_dissertations_have_no_doi() -> Result<()> {
        let headers = ["Title", "Abstract", "Authors", "documentType", "year", "DocumentURL"];
        let table = Table::from_rows(
            "ProQuest_D&T_result.csv",
            &headers,
            vec![vec![s("T"), s("A"), s("Lee, S."), s("Dissertation"), s("2016"), s("https://pq/1")]],
        );
        let records = SourceBatch::Proquest(table).normalize()?;
        assert_eq!(records[0].doi, "");
        assert_eq!(records[0].year, Some(2016));
        assert_eq!(records[0].search_method, SearchMethod::Proquest);
        Ok(())
    }

    #[test]
    fn test_llba_requires_doi_column() {
        let headers = ["Title", "Abstract", "Authors", "documentType", "year", "DocumentURL"];
        let table = Table::from_rows("LLBA_result.csv", &headers, vec![]);
        let err = SourceBatch::Llba(table).normalize().expect_err("LLBA export has a DOI column");
        assert!(matches!(err, SlrError::MissingColumn { column, .. } if column == "digitalObjectIdentifier"));
    }

    #[test]
    fn test_citation_rows_drop_placeholders_and_build_links() -> Result<()> {
        let rows = vec![
            CitationRecord {
                authors: s("A, B"),
                year: Some(2012),
                title: s("Found"),
                abstract_text: s(""),
                corpus_id: s("1"),
                doi: s("10.1/found"),
            },
            CitationRecord::placeholder("CorpusId:9"),
        ];
        let records = SourceBatch::Ancestry(rows).normalize()?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].link, "https://doi.org/10.1/found");
        assert_eq!(records[0].search_method, SearchMethod::Ancestry);
        Ok(())
    }

    #[test]
    fn test_google_authors_and_year() -> Result<()> {
        let hits = vec![GoogleScholarHit {
            title: s("Pragmatic competence"),
            publication_info: s("N Taguchi, C Roever - Language Learning, 2015 - Wiley"),
            link: s("https://example.org/p"),
        }];
        let records = SourceBatch::Google(hits).normalize()?;
        assert_eq!(records[0].authors, "N Taguchi, C Roever");
        assert_eq!(records[0].year, Some(2015));
        assert_eq!(records[0].doi, "");
        Ok(())
    }

    #[test]
    fn test_ris_journal_export() -> Result<()> {
        let file = ris::parse(
            "TY  - JOUR\nT1  - Primary only\nPY  - 2020\nAB  - x\nUR  - https://u\nDO  - 10.1016/j.system.2020.102345\nER  - \n\
             TY  - JOUR\nAU  - Smith, J.\nAU  - Doe, K.\nTI  - Titled\nPY  - 2021\nUR  - https://v\nER  - \n",
        )?;
        let batch = SourceBatch::Journal {
            journal: s("system"),
            export: JournalExport::Ris {
                path: PathBuf::from("system.txt"),
                file,
            },
        };
        let records = batch.normalize()?;
        assert_eq!(records[0].authors, "");
        assert_eq!(records[0].title, "Primary only");
        assert_eq!(records[0].year, Some(2020));
        assert_eq!(records[0].doi, "10.1016/j.system.2020.102345");
        assert!(records[1].authors.starts_with("Smith"));
        assert!(records[1].authors.contains(" Doe"));
        assert_eq!(records[1].doi, "");
        assert_eq!(records[1].search_method.to_string(), "manual_search[system]");
        Ok(())
    }

    #[test]
    fn test_no_normalized_doi_keeps_resolver_prefix() -> Result<()> {
        let citations = vec![ApaCitation {
            apa: s("x"),
            authors: s("A"),
            year: s("2001"),
            title: s("T"),
            doi: s("https://doi.org/10.3/z"),
        }];
        let restamped = vec![Record {
            authors: s("B"),
            year: None,
            title: s("U"),
            abstract_text: s(""),
            document_type: s(""),
            doi: s("https://doi.org/10.4/w"),
            link: s(""),
            search_method: SearchMethod::Google,
        }];

        let mut all = SourceBatch::Apa(citations).normalize()?;
        all.extend(
            SourceBatch::Journal {
                journal: s("intercultural_pragmatics"),
                export: JournalExport::Normalized(restamped),
            }
            .normalize()?,
        );

        assert!(all.iter().all(|r| !r.doi.starts_with("https://doi.org/")));
        assert_eq!(all[1].search_method, SearchMethod::ManualSearch(s("intercultural_pragmatics")));
        Ok(())
    }
}
