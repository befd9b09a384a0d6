//! Semantic Scholar API Client
//!
//! Ancestry and forward searches over the citation graph of a set of seed papers.
//!
//! API Details:
//! - References endpoint: GET /graph/v1/paper/{id}/references (papers a seed cites)
//! - Citations endpoint: GET /graph/v1/paper/{id}/citations (papers citing a seed)
//! - Paper endpoint: GET /graph/v1/paper/{id}
//! - Rate limit: 1 req/s (unauthenticated), higher with API key

use crate::error::{Result, SlrError};
use crate::table::{cell, Table};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Semantic Scholar API base URL
pub const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Maximum linked papers requested per seed paper
pub const CITATION_RETRIEVE_LIMIT: usize = 1000;

/// Fields requested for each linked paper
const LINK_FIELDS: &str = "paperId,corpusId";

/// Fields requested for the metadata lookup
const PAPER_FIELDS: &str = "authors,year,title,abstract,externalIds";

/// Retries on HTTP 429 before giving up on a request
const MAX_RETRIES: u32 = 3;

/// A seed paper from the target list, identified as `<id-type>:<id-value>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPaper {
    pub paper: String,
    pub paper_id_type: String,
    pub paper_id: String,
}

impl TargetPaper {
    /// Identifier in the form the API expects, e.g. `DOI:10.1017/xyz`
    pub fn search_id(&self) -> String {
        format!("{}:{}", self.paper_id_type, self.paper_id)
    }
}

/// Load the seed paper list (`paper`, `paper_id_type`, `paper_id` columns).
pub fn load_target_papers(path: &Path) -> Result<Vec<TargetPaper>> {
    let table = Table::read(path)?;
    let [paper, id_type, id] = table.columns(["paper", "paper_id_type", "paper_id"])?;

    Ok(table
        .rows()
        .map(|row| TargetPaper {
            paper: cell(row, paper).to_string(),
            paper_id_type: cell(row, id_type).to_string(),
            paper_id: cell(row, id).to_string(),
        })
        .collect())
}

/// Which side of the citation graph to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationDirection {
    /// Papers a seed cites (ancestry search)
    References,
    /// Papers that cite a seed (forward search)
    Citations,
}

impl CitationDirection {
    fn endpoint(self) -> &'static str {
        match self {
            CitationDirection::References => "references",
            CitationDirection::Citations => "citations",
        }
    }
}

/// Metadata row for one linked paper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRecord {
    pub authors: String,
    pub year: Option<i32>,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub corpus_id: String,
    pub doi: String,
}

impl CitationRecord {
    /// All-empty row standing in for a paper whose lookup failed.
    pub fn placeholder(requested_id: &str) -> Self {
        Self {
            corpus_id: requested_id.to_string(),
            ..Self::default()
        }
    }
}

/// Identifier pair of a linked paper as returned by the graph endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaperRef {
    #[serde(rename = "paperId")]
    pub paper_id: Option<String>,
    #[serde(rename = "corpusId")]
    pub corpus_id: Option<i64>,
}

impl PaperRef {
    /// Dedup key: the paper id, or `CorpusId:<n>` when the paper id is null.
    pub fn key(&self) -> Option<String> {
        match (&self.paper_id, self.corpus_id) {
            (Some(id), _) if !id.is_empty() => Some(id.clone()),
            (_, Some(corpus_id)) => Some(format!("CorpusId:{}", corpus_id)),
            _ => None,
        }
    }
}

/// Unique keys in first-seen order.
pub fn unique_paper_keys(refs: &[PaperRef]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    for paper in refs {
        match paper.key() {
            Some(key) => {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            None => warn!("Linked paper has neither paperId nor corpusId, skipping"),
        }
    }

    keys
}

#[derive(Debug, Deserialize)]
struct SSLinkPage {
    #[serde(default)]
    data: Vec<SSLink>,
}

#[derive(Debug, Deserialize)]
struct SSLink {
    #[serde(rename = "citedPaper")]
    cited_paper: Option<PaperRef>,
    #[serde(rename = "citingPaper")]
    citing_paper: Option<PaperRef>,
}

#[derive(Debug, Deserialize)]
struct SSPaper {
    #[serde(default)]
    authors: Vec<SSAuthor>,
    year: Option<i32>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "externalIds")]
    external_ids: Option<SSExternalIds>,
}

#[derive(Debug, Deserialize)]
struct SSAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "CorpusId")]
    corpus_id: Option<serde_json::Value>,
}

impl From<SSPaper> for CitationRecord {
    fn from(paper: SSPaper) -> Self {
        let authors = paper
            .authors
            .into_iter()
            .filter_map(|a| a.name)
            .collect::<Vec<_>>()
            .join(", ");

        let (corpus_id, doi) = match paper.external_ids {
            Some(ids) => {
                let corpus_id = match ids.corpus_id {
                    Some(serde_json::Value::String(s)) => s,
                    Some(serde_json::Value::Number(n)) => n.to_string(),
                    _ => String::new(),
                };
                (corpus_id, ids.doi.unwrap_or_default())
            }
            None => (String::new(), String::new()),
        };

        CitationRecord {
            authors,
            year: paper.year,
            title: paper.title.unwrap_or_default(),
            abstract_text: paper.abstract_text.unwrap_or_default(),
            corpus_id,
            doi,
        }
    }
}

/// Sequential Semantic Scholar client.
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    request_delay: Duration,
}

impl SemanticScholarClient {
    /// Create a client against the public API.
    ///
    /// Without an API key requests are spaced one second apart.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let delay = if api_key.is_some() {
            Duration::ZERO
        } else {
            Duration::from_secs(1)
        };
        Self::with_params(SS_API_BASE, delay, api_key)
    }

    /// Create a client with explicit base URL and request spacing.
    pub fn with_params(base_url: &str, request_delay: Duration, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SlrError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            request_delay,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut backoff = Duration::from_secs(2);

        for attempt in 0..MAX_RETRIES {
            if !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            let mut request = self.client.get(&url).query(params);
            if let Some(key) = &self.api_key {
                request = request.header("x-api-key", key);
            }

            debug!(url = %url, attempt = attempt + 1, "Sending request");
            let response = request.send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                warn!(url = %url, wait_secs = backoff.as_secs(), "Rate limited, waiting");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(SlrError::Api {
                    code: status.as_u16() as i32,
                    message: format!("Semantic Scholar API error: {} - {}", status, error_text),
                });
            }

            return response.json::<T>().await.map_err(|e| {
                SlrError::Parse(format!("Failed to parse Semantic Scholar response: {}", e))
            });
        }

        Err(SlrError::RateLimited(backoff.as_secs()))
    }

    /// Fetch up to [`CITATION_RETRIEVE_LIMIT`] linked papers of one seed.
    pub async fn linked_papers(&self, paper_id: &str, direction: CitationDirection) -> Result<Vec<PaperRef>> {
        let limit = CITATION_RETRIEVE_LIMIT.to_string();
        let page: SSLinkPage = self
            .get_json(
                &format!("/paper/{}/{}", paper_id, direction.endpoint()),
                &[("fields", LINK_FIELDS), ("limit", &limit)],
            )
            .await?;

        Ok(page
            .data
            .into_iter()
            .filter_map(|link| match direction {
                CitationDirection::References => link.cited_paper,
                CitationDirection::Citations => link.citing_paper,
            })
            .collect())
    }

    /// Fetch metadata of one paper.
    pub async fn paper_metadata(&self, paper_key: &str) -> Result<CitationRecord> {
        let paper: SSPaper = self
            .get_json(&format!("/paper/{}", paper_key), &[("fields", PAPER_FIELDS)])
            .await?;
        Ok(paper.into())
    }

    /// Metadata lookup that never fails: a missing paper becomes a placeholder row.
    pub async fn metadata_or_placeholder(&self, paper_key: &str) -> CitationRecord {
        match self.paper_metadata(paper_key).await {
            Ok(record) => record,
            Err(e) => {
                warn!(paper = paper_key, error = %e, "Paper not found in Semantic Scholar");
                CitationRecord::placeholder(paper_key)
            }
        }
    }

    /// Walk the citation graph from every seed, deduplicate linked papers,
    /// then fetch metadata for each unique one.
    pub async fn collect(&self, targets: &[TargetPaper], direction: CitationDirection) -> Result<Vec<CitationRecord>> {
        let mut linked = Vec::new();

        for target in targets {
            let search_id = target.search_id();
            info!(paper = %target.paper, id = %search_id, ?direction, "Retrieving linked papers");
            let papers = self.linked_papers(&search_id, direction).await?;
            info!(paper = %target.paper, count = papers.len(), "Linked papers retrieved");
            linked.extend(papers);
        }

        let keys = unique_paper_keys(&linked);
        info!(raw = linked.len(), unique = keys.len(), "Deduplicated linked papers");

        let mut records = Vec::with_capacity(keys.len());
        for (idx, key) in keys.iter().enumerate() {
            if (idx + 1) % 50 == 0 {
                info!(done = idx + 1, total = keys.len(), "Retrieving paper metadata");
            }
            records.push(self.metadata_or_placeholder(key).await);
        }

        Ok(records)
    }
}
