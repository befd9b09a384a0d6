//! Journal search-result page scraping.
//!
//! Hand searches of individual journals are saved as HTML, one file per
//! result page (`page_1.html`, `page_2.html`, ...). Each site has its own
//! markup, so each [`JournalSite`] carries its own selectors. Pages whose
//! markup no longer matches, including pages with no result blocks at all,
//! fail with [`SlrError::Structure`] rather than yielding silently empty
//! output.

use crate::error::{Result, SlrError};
use crate::doi::{doi_link, normalize_doi};
use crate::record::year_in_text;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Journals whose saved search pages can be scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalSite {
    /// De Gruyter, DOI in a `data-doi` attribute
    InterculturalPragmatics,
    /// Oxford Academic, DOI in a citation anchor
    AppliedLinguistics,
}

/// Where a site's DOI lives in a result block.
enum DoiSource {
    /// Attribute on the first anchor inside the container
    DataAttribute { container: &'static str, attr: &'static str },
    /// First anchor whose text or href mentions doi.org
    AnchorText,
}

struct SiteProfile {
    record: &'static str,
    title: &'static str,
    authors: &'static str,
    year: &'static str,
    snippet: &'static str,
    doi: DoiSource,
}

impl JournalSite {
    pub const ALL: [JournalSite; 2] = [JournalSite::InterculturalPragmatics, JournalSite::AppliedLinguistics];

    /// Journal name used in directory names and `manual_search[...]` tags.
    pub fn name(self) -> &'static str {
        match self {
            JournalSite::InterculturalPragmatics => "intercultural_pragmatics",
            JournalSite::AppliedLinguistics => "applied_linguistics",
        }
    }

    /// Number of saved result pages.
    pub fn page_count(self) -> u32 {
        match self {
            JournalSite::InterculturalPragmatics => 2,
            JournalSite::AppliedLinguistics => 3,
        }
    }

    fn profile(self) -> SiteProfile {
        match self {
            JournalSite::InterculturalPragmatics => SiteProfile {
                record: "div#main-content",
                title: "h3.titleSearchPageResult.mb-0",
                authors: "span.contributors.suggested-products__tertiary-author-info.me-2",
                year: "span.pubDate",
                snippet: "div.snippets.snippetsContent.three-line-ellipsis.my-2",
                doi: DoiSource::DataAttribute {
                    container: "div.searchResultActions.d-flex.flex-wrap.mt-2.pt-1 a",
                    attr: "data-doi",
                },
            },
            JournalSite::AppliedLinguistics => SiteProfile {
                record: "div.sr-list.al-article-box.al-normal.clearfix",
                title: "h4.sri-title",
                authors: "div.sri-authors",
                year: "div.sri-date",
                snippet: "div.snippet",
                doi: DoiSource::AnchorText,
            },
        }
    }
}

impl std::str::FromStr for JournalSite {
    type Err = SlrError;

    fn from_str(s: &str) -> Result<Self> {
        JournalSite::ALL
            .into_iter()
            .find(|site| site.name() == s)
            .ok_or_else(|| SlrError::UnknownSource(s.to_string()))
    }
}

/// One article scraped from a search page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedArticle {
    pub authors: String,
    pub title: String,
    pub year: Option<i32>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub doi: String,
    pub link: String,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SlrError::Parse(format!("Invalid selector '{}': {}", css, e)))
}

fn element_text(elem: ElementRef<'_>) -> String {
    elem.text().collect::<String>()
}

/// Drop newlines and double quotes, trim, collapse runs of spaces.
pub fn clean_inline_text(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| *c != '\n' && *c != '"').collect();
    stripped
        .trim()
        .split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trim and turn newlines into spaces.
pub fn clean_snippet(raw: &str) -> String {
    raw.trim().replace('\n', " ")
}

/// Parse one saved result page.
pub fn parse_page(site: JournalSite, html: &str, page: u32) -> Result<Vec<ScrapedArticle>> {
    let profile = site.profile();
    let document = Html::parse_document(html);

    let record_sel = selector(profile.record)?;
    let title_sel = selector(profile.title)?;
    let authors_sel = selector(profile.authors)?;
    let year_sel = selector(profile.year)?;
    let snippet_sel = selector(profile.snippet)?;
    let anchor_sel = selector("a")?;

    let structure_error = |detail: String| SlrError::Structure {
        site: site.name().to_string(),
        page,
        detail,
    };

    let blocks: Vec<ElementRef<'_>> = document.select(&record_sel).collect();
    if blocks.is_empty() {
        return Err(structure_error(format!("no result blocks matching '{}'", profile.record)));
    }

    let mut articles = Vec::with_capacity(blocks.len());

    for (idx, record) in blocks.into_iter().enumerate() {
        let title_elem = record
            .select(&title_sel)
            .next()
            .ok_or_else(|| structure_error(format!("result {} has no '{}'", idx + 1, profile.title)))?;
        let title = clean_inline_text(&element_text(title_elem));

        let authors = record
            .select(&authors_sel)
            .next()
            .map(|e| clean_inline_text(&element_text(e)))
            .unwrap_or_default();

        let year = record
            .select(&year_sel)
            .next()
            .and_then(|e| year_in_text(&element_text(e)));

        let abstract_text = record
            .select(&snippet_sel)
            .next()
            .map(|e| clean_snippet(&element_text(e)))
            .unwrap_or_default();

        let raw_doi = match &profile.doi {
            DoiSource::DataAttribute { container, attr } => {
                let container_sel = selector(container)?;
                record
                    .select(&container_sel)
                    .next()
                    .and_then(|a| a.value().attr(attr))
                    .map(str::to_string)
                    .ok_or_else(|| structure_error(format!("result {} has no {} on '{}'", idx + 1, attr, container)))?
            }
            DoiSource::AnchorText => record
                .select(&anchor_sel)
                .find_map(|a| {
                    let text = element_text(a);
                    if text.contains("doi.org") {
                        return Some(text.trim().to_string());
                    }
                    a.value()
                        .attr("href")
                        .filter(|href| href.contains("doi.org"))
                        .map(str::to_string)
                })
                .ok_or_else(|| structure_error(format!("result {} has no doi.org anchor", idx + 1)))?,
        };

        let doi = normalize_doi(&raw_doi);
        let link = doi_link(&doi);

        articles.push(ScrapedArticle {
            authors,
            title,
            year,
            abstract_text,
            doi,
            link,
        });
    }

    debug!(site = site.name(), page, count = articles.len(), "Parsed search page");
    Ok(articles)
}

/// Parse `page_1.html ..= page_<n>.html` from a site's directory.
pub fn scrape_saved_pages(site: JournalSite, dir: &Path) -> Result<Vec<ScrapedArticle>> {
    let mut articles = Vec::new();

    for page in 1..=site.page_count() {
        let path = dir.join(format!("page_{}.html", page));
        let html = std::fs::read_to_string(&path)?;
        articles.extend(parse_page(site, &html, page)?);
    }

    info!(site = site.name(), count = articles.len(), "Scraped saved search pages");
    Ok(articles)
}
