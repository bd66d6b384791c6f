//! Corpus identifier extraction.
//!
//! Semantic Scholar exports put the paper's corpus id into the `url` field,
//! e.g. `https://www.semanticscholar.org/paper/CorpusID:12345`. Entries that
//! already carry a DOI, or whose url has no corpus marker, are never eligible.

use crate::bib;
use crate::error::{BibDoiError, OptionExt, Result};
use biblatex::Bibliography;
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Matches `CorpusID:`, `CorpusId:`, `corpus id :` and friends.
static CORPUS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)corpus\s*id\s*:").expect("corpus marker regex is valid"));

/// Normalized join key between bibliography entries and API results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorpusKey(String);

impl CorpusKey {
    /// Build a key from the numeric part. Rejects anything that is not all digits.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BibDoiError::Parse(format!("'{}' is not a numeric corpus id", id)));
        }
        Ok(Self(format!("CorpusID:{}", id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorpusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pull a corpus key out of a url-like field value.
///
/// Returns `Ok(None)` when there is no corpus marker at all, and an error when
/// the marker is there but what follows it is not a usable id.
pub fn parse_corpus_key(value: &str) -> Result<Option<CorpusKey>> {
    let Some(marker) = CORPUS_MARKER.find(value) else {
        return Ok(None);
    };

    let id = value[marker.end()..]
        .split(['/', '?', '#'])
        .next()
        .ok_or_parse("nothing after corpus marker")?;

    CorpusKey::new(id).map(Some)
}

/// Corpus keys mapped to the bibliography key of the entry they came from.
///
/// Iteration follows first-insertion order. Inserting an existing key replaces
/// the entry it points to but keeps its position.
#[derive(Debug, Default, Clone)]
pub struct CorpusMap {
    entries: IndexMap<CorpusKey, String>,
}

impl CorpusMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping, returning the entry key it replaced, if any.
    pub fn insert(&mut self, key: CorpusKey, entry_key: String) -> Option<String> {
        self.entries.insert(key, entry_key)
    }

    pub fn get(&self, key: &CorpusKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CorpusKey, &str)> {
        self.entries.iter().map(|(k, e)| (k, e.as_str()))
    }

    /// Keys in insertion order, ready for batching.
    pub fn keys(&self) -> Vec<CorpusKey> {
        self.entries.keys().cloned().collect()
    }
}

/// Why entries were or were not picked up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub total_entries: usize,
    pub with_doi: usize,
    pub without_corpus_id: usize,
    pub malformed: usize,
    /// Entries that lost their slot to a later entry with the same corpus id
    pub collisions: usize,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub corpus_map: CorpusMap,
    pub stats: ExtractionStats,
}

/// Scan every entry and collect the ones eligible for lookup.
pub fn extract(bib: &Bibliography) -> Extraction {
    let mut out = Extraction::default();

    for entry in bib.iter() {
        out.stats.total_entries += 1;

        if bib::has_field(entry, "doi") {
            out.stats.with_doi += 1;
            continue;
        }

        let Some(url) = bib::field(entry, "url") else {
            out.stats.without_corpus_id += 1;
            continue;
        };

        match parse_corpus_key(&url) {
            Ok(Some(key)) => {
                debug!(entry = %entry.key, corpus_id = %key, "Found corpus id");
                if let Some(previous) = out.corpus_map.insert(key.clone(), entry.key.clone()) {
                    out.stats.collisions += 1;
                    warn!(
                        corpus_id = %key,
                        previous = %previous,
                        entry = %entry.key,
                        "Corpus id shared by two entries, keeping the later one"
                    );
                }
            }
            Ok(None) => out.stats.without_corpus_id += 1,
            Err(e) => {
                out.stats.malformed += 1;
                warn!(entry = %entry.key, url = %url, error = %e, "Skipping malformed corpus id");
            }
        }
    }

    info!(
        total = out.stats.total_entries,
        eligible = out.corpus_map.len(),
        with_doi = out.stats.with_doi,
        malformed = out.stats.malformed,
        "Collected corpus ids"
    );

    out
}
