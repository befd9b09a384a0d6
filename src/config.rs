//! Directory layout and small JSON settings files.
//!
//! Everything lives under a work directory:
//!
//! ```text
//! data/raw/        seed paper list, search query, google_search_bkup/
//! data/external/   database exports, RIS files, APA lists, saved HTML
//! data/processed/  stage outputs
//! environment/     serpapi_key.json
//! ```

use crate::error::{Result, SlrError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Extensions tried for a database export when the expected one is absent.
const EXPORT_EXTENSIONS: &[&str] = &["xls", "xlsx", "csv", "tsv"];

/// First publication year admitted to screening.
pub const DEFAULT_ELIGIBLE_PUB_YEAR: i32 = 2010;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub raw_data_dir: PathBuf,
    pub processed_data_dir: PathBuf,
    pub external_data_dir: PathBuf,
    pub env_dir: PathBuf,
    pub eligible_pub_year: i32,
}

impl PipelineConfig {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            raw_data_dir: work_dir.join("data/raw"),
            processed_data_dir: work_dir.join("data/processed"),
            external_data_dir: work_dir.join("data/external"),
            env_dir: work_dir.join("environment"),
            eligible_pub_year: DEFAULT_ELIGIBLE_PUB_YEAR,
        }
    }

    pub fn with_eligible_pub_year(mut self, year: i32) -> Self {
        self.eligible_pub_year = year;
        self
    }

    pub fn raw(&self, name: &str) -> PathBuf {
        self.raw_data_dir.join(name)
    }

    pub fn external(&self, name: &str) -> PathBuf {
        self.external_data_dir.join(name)
    }

    pub fn processed(&self, name: &str) -> PathBuf {
        self.processed_data_dir.join(name)
    }

    /// An export in `data/external` named `<stem>.<ext>`. If that file does
    /// not exist, the same stem with another spreadsheet or CSV extension is
    /// used instead; with no match the expected path is returned.
    pub fn external_export(&self, stem: &str, ext: &str) -> PathBuf {
        let expected = self.external(&format!("{}.{}", stem, ext));
        if expected.exists() {
            return expected;
        }
        EXPORT_EXTENSIONS
            .iter()
            .map(|alt| self.external(&format!("{}.{}", stem, alt)))
            .find(|path| path.exists())
            .unwrap_or(expected)
    }

    /// Backup directory of raw Google Scholar pages.
    pub fn google_backup_dir(&self) -> PathBuf {
        self.raw("google_search_bkup")
    }

    /// SerpAPI key from `environment/serpapi_key.json`.
    pub fn load_serpapi_key(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct KeyFile {
            #[serde(rename = "privateApiKey")]
            private_api_key: String,
        }

        let key: KeyFile = read_json(&self.env_dir.join("serpapi_key.json"))?;
        if key.private_api_key.trim().is_empty() {
            return Err(SlrError::Config("serpapi_key.json has an empty privateApiKey".to_string()));
        }
        Ok(key.private_api_key)
    }

    /// Search query from `data/raw/<filename>.json`.
    pub fn load_query(&self, filename: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct QueryFile {
            query: String,
        }

        let query: QueryFile = read_json(&self.raw(&format!("{}.json", filename)))?;
        Ok(query.query)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SlrError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&content)?)
}
