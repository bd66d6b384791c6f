//! Load → extract → fetch → merge → write.

use crate::bib;
use crate::config::FetchConfig;
use crate::corpus;
use crate::error::Result;
use crate::merge;
use crate::report::Summary;
use crate::semanticscholar::{BatchFetcher, Sleeper, Transport};
use std::path::Path;
use tracing::info;

/// Enrich `input` against the live API and write `<stem>_modified.bib`.
pub fn run(input: &Path, config: FetchConfig) -> Result<Summary> {
    let fetcher = BatchFetcher::from_config(config)?;
    run_with(input, &fetcher)
}

/// Same as [`run`] with a caller-supplied fetcher.
///
/// Only a failure to read, parse or write the bibliography is returned as an
/// error. Lookup failures show up as missing entries in the summary.
pub fn run_with<T: Transport, S: Sleeper>(
    input: &Path,
    fetcher: &BatchFetcher<T, S>,
) -> Result<Summary> {
    let mut bibliography = bib::load(input)?;

    let extraction = corpus::extract(&bibliography);
    let results = fetcher.fetch_all(&extraction.corpus_map.keys());
    let merged = merge::merge_results(&mut bibliography, &extraction.corpus_map, &results);

    let output = bib::output_path(input);
    bib::save(&bibliography, &output)?;

    info!(
        updated = merged.total_updated(),
        missing = merged.total_missing(),
        "Enrichment complete"
    );

    Ok(Summary {
        extraction: extraction.stats,
        merge: merged,
        output,
    })
}
