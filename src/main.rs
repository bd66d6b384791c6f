//! bibdoi - add DOIs to BibTeX entries via Semantic Scholar corpus ids
//!
//! ## Usage
//!
//! ```bash
//! bibdoi references.bib
//! bibdoi references.bib --batch-size 100
//! ```
//!
//! Writes `references_modified.bib` next to the input. Set `S2_API_KEY` to use
//! an API key and `RUST_LOG` to change log verbosity.

use anyhow::{Context, Result};
use bibdoi::{config::FetchConfig, config::MAX_BATCH_SIZE, pipeline};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Look up DOIs for BibTeX entries that carry a Semantic Scholar corpus id
#[derive(Parser)]
#[command(name = "bibdoi")]
#[command(version, about, long_about = None)]
struct Cli {
    /// BibTeX file
    bibfile: PathBuf,

    /// Corpus ids per API request (values above 500 are clamped)
    #[arg(short, long, default_value_t = MAX_BATCH_SIZE)]
    batch_size: usize,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let config = FetchConfig::from_env()
        .context("Invalid Semantic Scholar settings")?
        .with_batch_size(cli.batch_size);

    info!(
        file = %cli.bibfile.display(),
        batch_size = config.batch_size(),
        authenticated = config.api_key.is_some(),
        "Starting DOI lookup"
    );

    let summary = pipeline::run(&cli.bibfile, config)
        .with_context(|| format!("Failed to process {}", cli.bibfile.display()))?;

    println!("{}", summary);

    Ok(())
}
