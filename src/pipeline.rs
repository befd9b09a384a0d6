//! Pipeline stages.
//!
//! Each stage reads its inputs from the work directory layout described in
//! [`crate::config`], runs extract → normalize → dedup, and writes one CSV to
//! `data/processed`. Stages are independent commands; later stages read the
//! files earlier ones wrote.

use crate::apa::{read_citation_list, ApaCitation};
use crate::config::PipelineConfig;
use crate::dedup::{dedup_by_priority, drop_flagged_duplicates, drop_known_dois, filter_by_year, sort_records, YearWindow};
use crate::error::Result;
use crate::gscholar::{self, GoogleScholarHit, PageCache, SearchApi};
use crate::journal_scrape::{scrape_saved_pages, JournalSite};
use crate::normalize::{JournalExport, SourceBatch};
use crate::record::{Record, ScreeningRecord};
use crate::ris;
use crate::semanticscholar::{load_target_papers, CitationDirection, CitationRecord, SemanticScholarClient};
use crate::sink::{read_records, read_rows, write_rows, TextEncoding};
use crate::table::Table;
use std::path::PathBuf;
use tracing::info;

pub const ANCESTRY_OUTPUT: &str = "ancestry_search_result.csv";
pub const FORWARD_OUTPUT: &str = "forward_search_result.csv";
pub const GOOGLE_OUTPUT: &str = "google_scholar_result.csv";
pub const APA_OUTPUT: &str = "apa_ancestry_search_result.csv";
pub const DB_MERGED_OUTPUT: &str = "db_search_merged_unique.csv";
pub const MANUAL_MERGED_OUTPUT: &str = "manual_search_merged_unique.csv";
pub const DB_RECORDS_OUTPUT: &str = "db_search_records.csv";
pub const ADDITIONAL_DB_RECORDS_OUTPUT: &str = "additional_db_search_records.csv";
pub const SCREENING_OUTPUT: &str = "db_manual_search_records.csv";

pub const ADDITIONAL_ANCESTRY_INPUT: &str = "additional_ancestry_search_result.csv";
pub const ADDITIONAL_APA_INPUT: &str = "additional_apa_ancestry_search_result.csv";
/// Screening sheet stem in `data/external`; the reviewers save it as `.xlsx`.
pub const SCREENED_DB_SHEET: &str = "db_search_records_manual_dup_remove";

/// Seed papers whose reference lists are only available as APA text.
pub const APA_ANCESTRY_CITING_PAPERS: &[&str] = &["plonsky_zhuang", "mori_mori_mori_et_al"];

/// How a hand-searched journal's results were exported.
#[derive(Debug, Clone, Copy)]
enum ManualFile {
    /// RIS file in `data/external`
    Ris(&'static str),
    /// ProQuest-style `.xls` export in `data/external`, by stem
    Proquest(&'static str),
    /// EBSCO-style CSV export in `data/external`, by stem
    Ebsco(&'static str),
    /// Output of the `scrape` stage in `data/processed`
    Scraped,
}

/// Hand-searched journals and their export files, in merge order.
const MANUAL_SOURCES: &[(&str, ManualFile)] = &[
    ("applied_linguistics", ManualFile::Scraped),
    ("annual_review_of_applied_linguistics", ManualFile::Proquest("annual_review_of_applied_linguistics")),
    ("foreign_language_annals", ManualFile::Ris("foreign_language_annals.txt")),
    (
        "international_journal_of_applied_linguistics",
        ManualFile::Ris("international_journal_of_applied_linguistics.txt"),
    ),
    ("language_learning", ManualFile::Ris("language_learning.txt")),
    ("second_language_research", ManualFile::Ris("second_language_research.txt")),
    (
        "studies_of_second_language_acquisition",
        ManualFile::Proquest("studies_of_second_language_acquisition"),
    ),
    ("system", ManualFile::Ris("system.txt")),
    ("journal_of_pragmatics", ManualFile::Ris("journal_of_pragmatics.ris")),
    ("intercultural_pragmatics", ManualFile::Scraped),
    ("east_asian_pragmatics", ManualFile::Ebsco("east_asian_pragmatics")),
    ("japanese_language_and_literature", ManualFile::Ris("japanese_language_and_literature.txt")),
];

/// What a stage wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub output: PathBuf,
    pub records: usize,
    /// Rows dropped as duplicates or by filters
    pub removed: usize,
}

/// Output file of the `scrape` stage for a site.
pub fn scraped_output_name(journal: &str) -> String {
    format!("{}_manual_search_result.csv", journal)
}

/// Ancestry (references) or forward (citations) search over the seed list in
/// `data/raw/<target_list>.csv`.
pub async fn citation_search(
    config: &PipelineConfig,
    client: &SemanticScholarClient,
    target_list: &str,
    direction: CitationDirection,
    output_name: &str,
) -> Result<StageSummary> {
    let targets = load_target_papers(&config.raw(&format!("{}.csv", target_list)))?;
    info!(targets = targets.len(), ?direction, "Starting citation search");

    let records = client.collect(&targets, direction).await?;
    let output = config.processed(output_name);
    write_rows(&output, &records, TextEncoding::Utf8)?;

    Ok(StageSummary {
        output,
        records: records.len(),
        removed: 0,
    })
}

/// Paginated Google Scholar search, backed up under `data/raw/google_search_bkup`.
pub async fn google_scholar_search<A: SearchApi>(
    config: &PipelineConfig,
    api: &A,
    query: &str,
) -> Result<StageSummary> {
    let cache = PageCache::new(config.google_backup_dir())?;
    let hits = gscholar::query(api, &cache, query).await?;

    let output = config.processed(GOOGLE_OUTPUT);
    write_rows(&output, &hits, TextEncoding::Utf8)?;

    Ok(StageSummary {
        output,
        records: hits.len(),
        removed: 0,
    })
}

/// Parse `data/external/<paper>.tsv` for each citing paper and concatenate.
pub fn apa_conversion(config: &PipelineConfig, citing_papers: &[String], output_name: &str) -> Result<StageSummary> {
    let mut citations = Vec::new();
    for paper in citing_papers {
        let parsed = read_citation_list(&config.external(&format!("{}.tsv", paper)))?;
        info!(paper = %paper, count = parsed.len(), "Parsed APA reference list");
        citations.extend(parsed);
    }

    let output = config.processed(output_name);
    write_rows(&output, &citations, TextEncoding::Utf8)?;

    Ok(StageSummary {
        output,
        records: citations.len(),
        removed: 0,
    })
}

/// Scrape `data/external/<site>/page_<n>.html` into canonical records.
pub fn scrape_journal(config: &PipelineConfig, site: JournalSite) -> Result<StageSummary> {
    let articles = scrape_saved_pages(site, &config.external(site.name()))?;
    let records = SourceBatch::Journal {
        journal: site.name().to_string(),
        export: JournalExport::Scraped(articles),
    }
    .normalize()?;

    let output = config.processed(&scraped_output_name(site.name()));
    write_rows(&output, &records, TextEncoding::Utf8)?;

    Ok(StageSummary {
        output,
        records: records.len(),
        removed: 0,
    })
}

fn normalize_all(batches: Vec<SourceBatch>) -> Result<Vec<Record>> {
    let mut merged = Vec::new();
    for batch in batches {
        merged.extend(batch.normalize()?);
    }
    Ok(merged)
}

/// Merge the database searches, citation searches and Google Scholar results,
/// keeping one record per DOI by source priority.
pub fn merge_db_search(config: &PipelineConfig) -> Result<StageSummary> {
    let batches = vec![
        SourceBatch::Ancestry(read_rows::<CitationRecord>(&config.processed(ANCESTRY_OUTPUT))?),
        SourceBatch::Forward(read_rows::<CitationRecord>(&config.processed(FORWARD_OUTPUT))?),
        SourceBatch::Google(read_rows::<GoogleScholarHit>(&config.processed(GOOGLE_OUTPUT))?),
        SourceBatch::Apa(read_rows::<ApaCitation>(&config.processed(APA_OUTPUT))?),
        SourceBatch::Eric(Table::read(&config.external_export("ERIC_result", "xls"))?),
        SourceBatch::Llba(Table::read(&config.external_export("LLBA_result", "xls"))?),
        SourceBatch::Proquest(Table::read(&config.external_export("ProQuest_D&T_result", "xls"))?),
        SourceBatch::Psycinfo(Table::read(&config.external_export("PsycINFO_result", "csv"))?),
    ];

    let merged = normalize_all(batches)?;
    let mut deduped = dedup_by_priority(merged);
    println!("{} duplicated records were detected!", deduped.removed);
    sort_records(&mut deduped.records);

    let output = config.processed(DB_MERGED_OUTPUT);
    write_rows(&output, &deduped.records, TextEncoding::Utf8)?;

    Ok(StageSummary {
        output,
        records: deduped.records.len(),
        removed: deduped.removed,
    })
}

fn load_manual_batch(config: &PipelineConfig, journal: &str, file: ManualFile) -> Result<SourceBatch> {
    let export = match file {
        ManualFile::Ris(name) => {
            let path = config.external(name);
            let file = ris::read(&path)?;
            JournalExport::Ris { path, file }
        }
        ManualFile::Proquest(stem) => JournalExport::ProquestStyle(Table::read(&config.external_export(stem, "xls"))?),
        ManualFile::Ebsco(stem) => JournalExport::EbscoStyle(Table::read(&config.external_export(stem, "csv"))?),
        ManualFile::Scraped => {
            JournalExport::Normalized(read_records(&config.processed(&scraped_output_name(journal)))?)
        }
    };

    Ok(SourceBatch::Journal {
        journal: journal.to_string(),
        export,
    })
}

/// Merge hand-searched journal results and drop anything the database merge
/// already found.
pub fn merge_manual_search(config: &PipelineConfig) -> Result<StageSummary> {
    let batches = MANUAL_SOURCES
        .iter()
        .map(|(journal, file)| load_manual_batch(config, journal, *file))
        .collect::<Result<Vec<_>>>()?;

    let merged = normalize_all(batches)?;
    let db_records = read_records(&config.processed(DB_MERGED_OUTPUT))?;

    let mut unique = drop_known_dois(merged, &db_records);
    println!("{} duplicated records were detected!", unique.removed);
    sort_records(&mut unique.records);

    let output = config.processed(MANUAL_MERGED_OUTPUT);
    write_rows(&output, &unique.records, TextEncoding::Utf8)?;

    Ok(StageSummary {
        output,
        records: unique.records.len(),
        removed: unique.removed,
    })
}

/// Keep database records published in or after the eligible year.
pub fn summarize_db_result(config: &PipelineConfig) -> Result<StageSummary> {
    let records = read_records(&config.processed(DB_MERGED_OUTPUT))?;
    let mut eligible = filter_by_year(records, YearWindow::From(config.eligible_pub_year));
    println!("{} ineligible records were detected!", eligible.removed);
    sort_records(&mut eligible.records);

    let output = config.processed(DB_RECORDS_OUTPUT);
    write_rows(&output, &eligible.records, TextEncoding::Utf8)?;

    Ok(StageSummary {
        output,
        records: eligible.records.len(),
        removed: eligible.removed,
    })
}

/// Combine the database records with a later round of ancestry results and
/// keep only records published before the eligible year.
pub fn reorganize_db_result(config: &PipelineConfig) -> Result<StageSummary> {
    let db_records = read_records(&config.processed(DB_MERGED_OUTPUT))?;

    let mut merged = normalize_all(vec![
        SourceBatch::Ancestry(read_rows::<CitationRecord>(&config.processed(ADDITIONAL_ANCESTRY_INPUT))?),
        SourceBatch::Apa(read_rows::<ApaCitation>(&config.processed(ADDITIONAL_APA_INPUT))?),
    ])?;
    merged.extend(db_records);

    let mut earlier = filter_by_year(merged, YearWindow::Before(config.eligible_pub_year));
    println!("{} ineligible records were detected!", earlier.removed);
    sort_records(&mut earlier.records);

    let output = config.processed(ADDITIONAL_DB_RECORDS_OUTPUT);
    write_rows(&output, &earlier.records, TextEncoding::Utf8)?;

    Ok(StageSummary {
        output,
        records: earlier.records.len(),
        removed: earlier.removed,
    })
}

/// Build the screening sheet: manually screened database records plus the
/// hand-search records, with an empty `is_eligible` column, as UTF-16.
pub fn merge_screening_sheet(config: &PipelineConfig) -> Result<StageSummary> {
    let sheet = Table::read(&config.external_export(SCREENED_DB_SHEET, "xlsx"))?;
    let screened = drop_flagged_duplicates(&sheet)?;
    println!("{} duplicated records were manually detected!", screened.removed);

    let mut records = screened.records;
    records.extend(read_records(&config.processed(MANUAL_MERGED_OUTPUT))?);
    sort_records(&mut records);

    let rows: Vec<ScreeningRecord> = records.into_iter().map(ScreeningRecord::from).collect();
    let output = config.processed(SCREENING_OUTPUT);
    write_rows(&output, &rows, TextEncoding::Utf16)?;

    Ok(StageSummary {
        output,
        records: rows.len(),
        removed: screened.removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SearchMethod;
    use std::path::Path;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    fn seed_db_inputs(config: &PipelineConfig) -> Result<()> {
        write(
            &config.processed(ANCESTRY_OUTPUT),
            "authors,year,title,abstract,corpus_id,doi\n\
             \"Roever, C.\",2011,Testing pragmatics,,11,10.1/shared\n\
             ,,,,CorpusId:9,\n",
        )?;
        write(&config.processed(FORWARD_OUTPUT), "authors,year,title,abstract,corpus_id,doi\n")?;
        write(
            &config.processed(GOOGLE_OUTPUT),
            "title,publication_info,link\nGrey literature,K Kim - 2014 - repository,https://repo/1\n",
        )?;
        write(
            &config.processed(APA_OUTPUT),
            "apa,authors,year,title,doi\n\"Roever, C. (2011). Testing pragmatics. LT.\",\"Roever, C.\",2011,Testing pragmatics,10.1/SHARED\n",
        )?;
        let proquest_header = "Title,Abstract,Authors,digitalObjectIdentifier,documentType,year,DocumentURL\n";
        write(
            &config.external("LLBA_result.csv"),
            &format!("{}Testing pragmatics,Abs,\"Roever, Carsten\",10.1/Shared,Journal Article,2011,https://pq/llba\n", proquest_header),
        )?;
        write(&config.external("ERIC_result.csv"), proquest_header)?;
        write(
            &config.external("ProQuest_D&T_result.csv"),
            "Title,Abstract,Authors,documentType,year,DocumentURL\nA thesis,,\"Lee, S.\",Dissertation,2008,https://pq/dt\n",
        )?;
        write(
            &config.external("PsycINFO_result.csv"),
            "title,abstract,publicationDate,contributors,docTypes,doi,plink\n",
        )?;
        Ok(())
    }

    #[test]
    fn test_merge_db_search_end_to_end() -> Result<()> {
        let dir = tempdir()?;
        let config = PipelineConfig::new(dir.path());
        seed_db_inputs(&config)?;

        let summary = merge_db_search(&config)?;
        assert_eq!(summary.removed, 2);
        assert_eq!(summary.records, 3);

        let records = read_records(&summary.output)?;
        let shared: Vec<&Record> = records.iter().filter(|r| r.doi.eq_ignore_ascii_case("10.1/shared")).collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].search_method, SearchMethod::Llba);

        let authors: Vec<&str> = records.iter().map(|r| r.authors.as_str()).collect();
        assert_eq!(authors, vec!["K Kim", "Lee, S.", "Roever, Carsten"]);

        let summary = summarize_db_result(&config)?;
        assert_eq!(summary.records, 2);
        assert_eq!(summary.removed, 1);
        Ok(())
    }

    #[test]
    fn test_screening_sheet_drops_flagged_rows() -> Result<()> {
        let dir = tempdir()?;
        let config = PipelineConfig::new(dir.path());

        write(
            &config.external(&format!("{}.csv", SCREENED_DB_SHEET)),
            "authors,year,title,abstract,document_type,doi,link,search_method,is_duplicated\n\
             B,2012,Kept,,,10.2/b,,eric,0\n\
             C,2013,Flagged,,,10.2/c,,eric,1\n",
        )?;
        write(
            &config.processed(MANUAL_MERGED_OUTPUT),
            "authors,year,title,abstract,document_type,doi,link,search_method\n\
             A,2019,Hand searched,,,10.3/a,https://doi.org/10.3/a,manual_search[system]\n",
        )?;

        let summary = merge_screening_sheet(&config)?;
        assert_eq!(summary.records, 2);
        assert_eq!(summary.removed, 1);

        let bytes = std::fs::read(&summary.output)?;
        assert_eq!(&bytes[..2], &[0xFF, 0xFE]);
        Ok(())
    }

    const RECORD_HEADER: &str = "authors,year,title,abstract,document_type,doi,link,search_method\n";

    fn ris_entry(title: &str, doi: &str) -> String {
        format!(
            "TY  - JOUR\nAU  - Author, A.\nPY  - 2016\nTI  - {}\nAB  - Abstract text\nUR  - https://example.org/{}\nDO  - {}\nER  - \n",
            title, title, doi
        )
    }

    #[test]
    fn test_merge_manual_search_drops_known_dois() -> Result<()> {
        let dir = tempdir()?;
        let config = PipelineConfig::new(dir.path());

        write(
            &config.processed(DB_MERGED_OUTPUT),
            &format!("{}Known,2014,Already found,,,10.9999/known,,llba\n", RECORD_HEADER),
        )?;

        for (journal, file) in MANUAL_SOURCES {
            match file {
                ManualFile::Ris(name) => {
                    let mut content = ris_entry(journal, &format!("10.1111/{}", journal));
                    if *journal == "system" {
                        content.push_str(&ris_entry("duplicate", "10.9999/KNOWN"));
                    }
                    write(&config.external(name), &content)?;
                }
                ManualFile::Proquest(stem) => write(
                    &config.external(&format!("{}.csv", stem)),
                    "Title,Abstract,Authors,digitalObjectIdentifier,documentType,year,DocumentURL\n",
                )?,
                ManualFile::Ebsco(stem) => write(
                    &config.external(&format!("{}.csv", stem)),
                    "title,abstract,publicationDate,contributors,docTypes,doi,plink\n",
                )?,
                ManualFile::Scraped => {
                    let rows = if *journal == "applied_linguistics" {
                        "Young,2019,Interactional competence,,,https://doi.org/10.8/al,https://doi.org/10.8/al,\
                         manual_search[applied_linguistics]\n"
                    } else {
                        ""
                    };
                    write(
                        &config.processed(&scraped_output_name(journal)),
                        &format!("{}{}", RECORD_HEADER, rows),
                    )?
                }
            }
        }

        let summary = merge_manual_search(&config)?;
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.records, 8);

        let records = read_records(&summary.output)?;
        assert!(records.iter().all(|r| !r.doi.eq_ignore_ascii_case("10.9999/known")));

        let scraped = records
            .iter()
            .find(|r| r.title == "Interactional competence")
            .ok_or_else(|| crate::error::SlrError::Parse("scraped record missing".into()))?;
        assert_eq!(scraped.doi, "10.8/al");
        assert_eq!(scraped.search_method, SearchMethod::ManualSearch("applied_linguistics".into()));

        let system = records
            .iter()
            .find(|r| r.doi == "10.1111/system")
            .ok_or_else(|| crate::error::SlrError::Parse("RIS record missing".into()))?;
        assert_eq!(system.search_method.to_string(), "manual_search[system]");
        assert_eq!(system.year, Some(2016));
        Ok(())
    }

    #[test]
    fn test_reorganize_keeps_records_before_eligible_year() -> Result<()> {
        let dir = tempdir()?;
        let config = PipelineConfig::new(dir.path());

        write(
            &config.processed(DB_MERGED_OUTPUT),
            &format!(
                "{}Chen,2005,Early database hit,,,10.1/a,,eric\nDiaz,2015,Recent database hit,,,10.1/b,,eric\n",
                RECORD_HEADER
            ),
        )?;
        write(
            &config.processed(ADDITIONAL_ANCESTRY_INPUT),
            "authors,year,title,abstract,corpus_id,doi\n\
             Abe,2003,Older reference,,3,10.2/c\n\
             Baker,2012,Newer reference,,4,10.2/d\n",
        )?;
        write(
            &config.processed(ADDITIONAL_APA_INPUT),
            "apa,authors,year,title,doi\n\
             \"Brown, P. (2008). Politeness. CUP.\",\"Brown, P.\",2008,Politeness,\n",
        )?;

        let summary = reorganize_db_result(&config.clone().with_eligible_pub_year(2010))?;
        assert_eq!(summary.records, 3);
        assert_eq!(summary.removed, 2);

        let records = read_records(&summary.output)?;
        let keys: Vec<(&str, Option<i32>)> = records.iter().map(|r| (r.authors.as_str(), r.year)).collect();
        assert_eq!(keys, vec![("Abe", Some(2003)), ("Brown, P.", Some(2008)), ("Chen", Some(2005))]);
        assert_eq!(records[0].search_method, SearchMethod::Ancestry);
        assert_eq!(records[1].search_method, SearchMethod::Apa);
        assert_eq!(records[2].search_method, SearchMethod::Eric);
        Ok(())
    }
}
