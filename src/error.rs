//! Custom error types for rustslr.
//!
//! This module defines all error types used throughout the pipeline.
//! All library functions return `Result<T, SlrError>` instead of using `unwrap()`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for rustslr operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum SlrError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Text or payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading/writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Excel workbook could not be opened or read
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// A source name with no registered transform
    #[error("Unknown source '{0}': no transform is registered for it")]
    UnknownSource(String),

    /// An input file lacks a column its export format always has
    #[error("Missing column '{column}' in {}", path.display())]
    MissingColumn {
        /// File that was read
        path: PathBuf,
        /// Expected column or field name
        column: String,
    },

    /// A saved HTML page does not have the structure its site profile expects
    #[error("Unexpected page structure for {site} page {page}: {detail}")]
    Structure {
        /// Site profile name
        site: String,
        /// 1-indexed page number
        page: u32,
        /// What was missing
        detail: String,
    },
}

/// Result type alias using `SlrError`
pub type Result<T> = std::result::Result<T, SlrError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| SlrError::Parse(msg.to_string()))
    }
}
