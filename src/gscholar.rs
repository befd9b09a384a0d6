//! Google Scholar search through the SerpAPI `google_scholar` engine.
//!
//! Result pages are fetched 20 at a time and every raw page is written to a
//! backup directory before it is used. A rerun reads pages from the backups and
//! only calls the API for offsets that were never fetched, so an interrupted
//! run can simply be restarted.

use crate::error::{OptionExt, Result, SlrError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default SerpAPI endpoint
pub const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// Results requested per page
pub const PAGE_SIZE: usize = 20;

/// Upper bound on results retrieved for one query
pub const MAXIMUM_TOTAL_ITEMS: usize = 1000;

/// A paginated search backend.
#[allow(async_fn_in_trait)]
pub trait SearchApi {
    /// Fetch one raw result page starting at `start`.
    async fn search(&self, query: &str, start: usize, num: usize) -> Result<Value>;
}

/// SerpAPI client for the Google Scholar engine.
pub struct SerpApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SerpApiClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(SERPAPI_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SlrError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    fn build_search_url(&self, query: &str, start: usize, num: usize) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SlrError::Config(format!("Invalid base URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("engine", "google_scholar")
            .append_pair("q", query)
            .append_pair("api_key", &self.api_key)
            .append_pair("start", &start.to_string())
            .append_pair("num", &num.to_string());

        Ok(url)
    }
}

impl SearchApi for SerpApiClient {
    async fn search(&self, query: &str, start: usize, num: usize) -> Result<Value> {
        let url = self.build_search_url(query, start, num)?;
        debug!(query, start, num, "Requesting SerpAPI page");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SlrError::RateLimited(60));
        }

        let page: Value = response.json().await?;

        if let Some(message) = page.get("error").and_then(Value::as_str) {
            return Err(SlrError::Api {
                code: status.as_u16() as i32,
                message: format!("SerpAPI error: {}", message),
            });
        }

        if !status.is_success() {
            return Err(SlrError::Api {
                code: status.as_u16() as i32,
                message: format!("HTTP error: {}", status),
            });
        }

        Ok(page)
    }
}

/// Write-once store of raw result pages keyed by `(query, offset)`.
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    /// Open (and create if needed) a backup directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// `<query>_<offset>.json`, with path separators in the query replaced.
    fn page_path(&self, query: &str, offset: usize) -> PathBuf {
        let safe_query: String = query
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{}_{}.json", safe_query, offset))
    }

    pub fn has_page(&self, query: &str, offset: usize) -> bool {
        self.page_path(query, offset).exists()
    }

    pub fn store_page(&self, query: &str, offset: usize, page: &Value) -> Result<()> {
        let path = self.page_path(query, offset);
        std::fs::write(&path, serde_json::to_string(page)?)?;
        debug!(path = %path.display(), "Stored page backup");
        Ok(())
    }

    pub fn load_page(&self, query: &str, offset: usize) -> Result<Value> {
        let content = std::fs::read_to_string(self.page_path(query, offset))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// `search_information.total_results` of a page, 0 when absent.
fn total_results(page: &Value) -> usize {
    match page
        .get("search_information")
        .and_then(|info| info.get("total_results"))
        .and_then(Value::as_u64)
    {
        Some(total) => total as usize,
        None => {
            warn!("Page has no search_information.total_results, stopping pagination");
            0
        }
    }
}

fn organic_results(page: &Value) -> &[Value] {
    page.get("organic_results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Fetch every page for `query`, reusing backed-up pages.
///
/// Stops once the offset reaches the reported total (capped at
/// [`MAXIMUM_TOTAL_ITEMS`]) or a page comes back without results.
pub async fn fetch_pages<A: SearchApi>(api: &A, cache: &PageCache, query: &str) -> Result<Vec<Value>> {
    let mut pages = Vec::new();
    let mut offset = 0;
    let mut total = MAXIMUM_TOTAL_ITEMS;
    let mut fetched = 0;

    while offset < total {
        let page = if cache.has_page(query, offset) {
            debug!(query, offset, "Loading page from backup");
            cache.load_page(query, offset)?
        } else {
            let page = api.search(query, offset, PAGE_SIZE).await?;
            cache.store_page(query, offset, &page)?;
            fetched += 1;
            page
        };

        total = total_results(&page).min(MAXIMUM_TOTAL_ITEMS);
        let hits = organic_results(&page).len();
        pages.push(page);
        offset += PAGE_SIZE;

        if hits == 0 {
            break;
        }
    }

    info!(query, pages = pages.len(), fetched, "Google Scholar pages ready");
    Ok(pages)
}

/// One organic result of a Google Scholar page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleScholarHit {
    pub title: String,
    /// Author/venue/year summary line, e.g. `J Doe, A Roe - System, 2015 - Elsevier`
    pub publication_info: String,
    pub link: String,
}

/// Extract title, publication summary and link from each organic result.
pub fn extract_hits(page: &Value) -> Result<Vec<GoogleScholarHit>> {
    organic_results(page)
        .iter()
        .map(|item| {
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .ok_or_parse("organic result without title")?;
            let publication_info = item
                .get("publication_info")
                .and_then(|info| info.get("summary"))
                .and_then(Value::as_str)
                .ok_or_parse("organic result without publication_info.summary")?;
            let link = item.get("link").and_then(Value::as_str).unwrap_or("");

            Ok(GoogleScholarHit {
                title: title.to_string(),
                publication_info: publication_info.to_string(),
                link: link.to_string(),
            })
        })
        .collect()
}

/// Fetch all pages for `query` and flatten them into hits.
pub async fn query<A: SearchApi>(api: &A, cache: &PageCache, query: &str) -> Result<Vec<GoogleScholarHit>> {
    let pages = fetch_pages(api, cache, query).await?;
    let mut hits = Vec::new();
    for page in &pages {
        hits.extend(extract_hits(page)?);
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Serves `total` synthetic results and counts calls.
    struct FakeScholar {
        total: usize,
        calls: AtomicUsize,
    }

    impl FakeScholar {
        fn new(total: usize) -> Self {
            Self {
                total,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SearchApi for FakeScholar {
        async fn search(&self, _query: &str, start: usize, num: usize) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let end = (start + num).min(self.total);
            let results: Vec<Value> = (start..end)
                .map(|i| {
                    json!({
                        "title": format!("Paper {}", i),
                        "publication_info": {"summary": format!("A Author - Journal, 20{:02} - Pub", i % 100)},
                        "link": format!("https://example.org/{}", i)
                    })
                })
                .collect();
            Ok(json!({
                "search_information": {"total_results": self.total},
                "organic_results": results
            }))
        }
    }

    #[tokio::test]
    async fn test_stops_at_total_results() -> Result<()> {
        let dir = tempdir()?;
        let cache = PageCache::new(dir.path())?;
        let api = FakeScholar::new(45);

        let hits = query(&api, &cache, "pragmatics").await?;
        assert_eq!(hits.len(), 45);
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
        assert!(cache.has_page("pragmatics", 40));
        assert!(!cache.has_page("pragmatics", 60));
        Ok(())
    }

    #[tokio::test]
    async fn test_global_cap() -> Result<()> {
        let dir = tempdir()?;
        let cache = PageCache::new(dir.path())?;
        let api = FakeScholar::new(50_000);

        let pages = fetch_pages(&api, &cache, "q").await?;
        assert_eq!(pages.len(), MAXIMUM_TOTAL_ITEMS / PAGE_SIZE);
        Ok(())
    }

    #[tokio::test]
    async fn test_rerun_uses_backups_only() -> Result<()> {
        let dir = tempdir()?;
        let cache = PageCache::new(dir.path())?;

        let first_api = FakeScholar::new(30);
        let first = query(&first_api, &cache, "interlanguage pragmatics").await?;

        let second_api = FakeScholar::new(30);
        let second = query(&second_api, &cache, "interlanguage pragmatics").await?;

        assert_eq!(second_api.calls.load(Ordering::SeqCst), 0);
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_extract_hits_defaults_missing_link() -> Result<()> {
        let page = json!({
            "organic_results": [
                {"title": "No link", "publication_info": {"summary": "B Roe - 2012"}}
            ]
        });
        let hits = extract_hits(&page)?;
        assert_eq!(hits[0].link, "");
        assert_eq!(hits[0].publication_info, "B Roe - 2012");
        Ok(())
    }

    #[test]
    fn test_extract_hits_requires_title() {
        let page = json!({"organic_results": [{"publication_info": {"summary": "x"}}]});
        assert!(extract_hits(&page).is_err());
    }

    #[test]
    fn test_build_search_url() -> Result<()> {
        let client = SerpApiClient::new("secret".to_string())?;
        let url = client.build_search_url("second language", 40, PAGE_SIZE)?;
        let s = url.as_str();
        assert!(s.contains("engine=google_scholar"));
        assert!(s.contains("q=second+language"));
        assert!(s.contains("start=40"));
        assert!(s.contains("num=20"));
        Ok(())
    }
}
