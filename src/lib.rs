//! # rustslr
//!
//! Record pipeline for a systematic literature review: collect candidate
//! papers from citation graphs, search engines, database exports and journal
//! sites, normalize them into one record shape, and deduplicate by DOI.
//!
//! ## Modules
//!
//! - [`semanticscholar`] - Ancestry and forward citation search
//! - [`gscholar`] - Paginated Google Scholar search through SerpAPI with a page cache
//! - [`journal_scrape`] - Saved journal search pages
//! - [`ris`] / [`apa`] / [`table`] - File-based inputs
//! - [`normalize`] - Per-source mapping onto [`record::Record`]
//! - [`dedup`] - DOI deduplication, year filters and ordering
//! - [`sink`] - CSV output (UTF-8 or UTF-16)
//! - [`pipeline`] - One function per stage
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustslr::{config::PipelineConfig, pipeline};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::new(Path::new("."));
//!     let summary = pipeline::merge_db_search(&config)?;
//!     println!("{} unique records", summary.records);
//!     Ok(())
//! }
//! ```

pub mod apa;
pub mod config;
pub mod dedup;
pub mod doi;
pub mod error;
pub mod gscholar;
pub mod journal_scrape;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod ris;
pub mod semanticscholar;
pub mod sink;
pub mod table;

pub use error::{Result, SlrError};
