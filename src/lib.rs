//! # bibdoi
//!
//! Fill in missing DOIs in BibTeX files using Semantic Scholar corpus ids.
//!
//! ## Modules
//!
//! - [`bib`] - BibTeX loading, writing and field access
//! - [`corpus`] - Corpus id extraction from entry urls
//! - [`semanticscholar`] - Batched Semantic Scholar lookup with retries
//! - [`merge`] - Writing DOI / ArXiv / DBLP ids back onto entries
//! - [`report`] - End-of-run summary
//! - [`pipeline`] - The whole run, start to finish
//! - [`config`] - Fetcher settings
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bibdoi::{config::FetchConfig, pipeline};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = FetchConfig::from_env()?.with_batch_size(500);
//!     let summary = pipeline::run(Path::new("refs.bib"), config)?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod bib;
pub mod config;
pub mod corpus;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod report;
pub mod semanticscholar;

pub use error::{BibDoiError, Result};
