//! rustslr - Systematic Literature Review Record Pipeline
//!
//! Each subcommand runs one stage and writes its CSV to `data/processed`
//! under the work directory.
//!
//! ## Usage
//!
//! ```bash
//! rustslr --work-dir ./review ancestry
//! rustslr --work-dir ./review google
//! rustslr --work-dir ./review merge-db
//! rustslr --work-dir ./review --eligible-year 2010 summarize-db
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustslr::config::{PipelineConfig, DEFAULT_ELIGIBLE_PUB_YEAR};
use rustslr::gscholar::SerpApiClient;
use rustslr::journal_scrape::JournalSite;
use rustslr::pipeline::{self, StageSummary};
use rustslr::semanticscholar::{CitationDirection, SemanticScholarClient};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Systematic Literature Review Record Pipeline
#[derive(Parser)]
#[command(name = "rustslr")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Work directory containing data/ and environment/
    #[arg(short, long, global = true, default_value = ".")]
    work_dir: PathBuf,

    /// First publication year eligible for screening
    #[arg(long, global = true, default_value_t = DEFAULT_ELIGIBLE_PUB_YEAR)]
    eligible_year: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect the references of each target paper from Semantic Scholar
    Ancestry {
        /// Target paper list in data/raw (without .csv)
        #[arg(long, default_value = "ancestry_target_paper_list")]
        targets: String,

        /// Output file in data/processed
        #[arg(short, long, default_value = pipeline::ANCESTRY_OUTPUT)]
        output: String,

        /// Semantic Scholar API key
        #[arg(long)]
        s2_api_key: Option<String>,
    },

    /// Collect the papers citing each target paper from Semantic Scholar
    Forward {
        /// Target paper list in data/raw (without .csv)
        #[arg(long, default_value = "forward_target_paper_list")]
        targets: String,

        /// Output file in data/processed
        #[arg(short, long, default_value = pipeline::FORWARD_OUTPUT)]
        output: String,

        /// Semantic Scholar API key
        #[arg(long)]
        s2_api_key: Option<String>,
    },

    /// Search Google Scholar through SerpAPI, caching every page
    Google {
        /// Query file in data/raw (without .json)
        #[arg(long, default_value = "google_scholar_search_keyword")]
        query_file: String,
    },

    /// Parse APA reference lists of citing papers
    Apa {
        /// Citing paper TSV in data/external (without .tsv); repeatable
        #[arg(long = "paper")]
        papers: Vec<String>,

        /// Output file in data/processed
        #[arg(short, long, default_value = pipeline::APA_OUTPUT)]
        output: String,
    },

    /// Parse saved search result pages of a journal site
    Scrape {
        /// intercultural_pragmatics or applied_linguistics
        site: String,
    },

    /// Merge database and citation searches, deduplicating by DOI priority
    MergeDb,

    /// Merge hand-searched journals and drop DOIs already in the database merge
    MergeManual,

    /// Keep database records from the eligible year on
    SummarizeDb,

    /// Collect database and additional ancestry records before the eligible year
    ReorganizeDb,

    /// Build the UTF-16 screening sheet
    MergeScreening,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let config = PipelineConfig::new(&cli.work_dir).with_eligible_pub_year(cli.eligible_year);

    let summary = match cli.command {
        Commands::Ancestry {
            targets,
            output,
            s2_api_key,
        } => run_citation_search(&config, &targets, CitationDirection::References, &output, s2_api_key).await?,
        Commands::Forward {
            targets,
            output,
            s2_api_key,
        } => run_citation_search(&config, &targets, CitationDirection::Citations, &output, s2_api_key).await?,
        Commands::Google { query_file } => run_google(&config, &query_file).await?,
        Commands::Apa { papers, output } => {
            let papers = if papers.is_empty() {
                pipeline::APA_ANCESTRY_CITING_PAPERS.iter().map(|p| p.to_string()).collect()
            } else {
                papers
            };
            pipeline::apa_conversion(&config, &papers, &output).context("APA conversion failed")?
        }
        Commands::Scrape { site } => {
            let site: JournalSite = site.parse().context("Unknown journal site")?;
            pipeline::scrape_journal(&config, site).with_context(|| format!("Scraping {} failed", site.name()))?
        }
        Commands::MergeDb => pipeline::merge_db_search(&config).context("Database merge failed")?,
        Commands::MergeManual => pipeline::merge_manual_search(&config).context("Manual search merge failed")?,
        Commands::SummarizeDb => pipeline::summarize_db_result(&config).context("Database summary failed")?,
        Commands::ReorganizeDb => pipeline::reorganize_db_result(&config).context("Database reorganization failed")?,
        Commands::MergeScreening => pipeline::merge_screening_sheet(&config).context("Screening merge failed")?,
    };

    report(&summary);
    Ok(())
}

async fn run_citation_search(
    config: &PipelineConfig,
    targets: &str,
    direction: CitationDirection,
    output: &str,
    api_key: Option<String>,
) -> Result<StageSummary> {
    let client = SemanticScholarClient::new(api_key).context("Failed to build Semantic Scholar client")?;
    pipeline::citation_search(config, &client, targets, direction, output)
        .await
        .context("Citation search failed")
}

async fn run_google(config: &PipelineConfig, query_file: &str) -> Result<StageSummary> {
    let api_key = config.load_serpapi_key().context("SerpAPI key not available")?;
    let query = config.load_query(query_file).context("Search query not available")?;
    info!(query = %query, "Google Scholar query loaded");

    let api = SerpApiClient::new(api_key).context("Failed to build SerpAPI client")?;
    pipeline::google_scholar_search(config, &api, &query)
        .await
        .context("Google Scholar search failed")
}

fn report(summary: &StageSummary) {
    println!(
        "Saved {} records to {} ({} removed)",
        summary.records,
        summary.output.display(),
        summary.removed
    );
}
