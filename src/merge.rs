//! Writes fetched identifiers back onto bibliography entries.
//!
//! Each eligible entry receives at most one new field, chosen in priority order
//! DOI, then ArXiv, then DBLP. Entries that end up with none are recorded as
//! missing.

use crate::bib;
use crate::corpus::CorpusMap;
use crate::semanticscholar::{BatchResult, ExternalIds};
use biblatex::Bibliography;
use std::fmt;
use tracing::{debug, info, warn};

/// Which identifier an entry received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Doi,
    ArXiv,
    Dblp,
}

impl IdKind {
    /// Lookup order
    pub const PRIORITY: [IdKind; 3] = [IdKind::Doi, IdKind::ArXiv, IdKind::Dblp];

    /// Field name written into the entry
    pub fn field_name(self) -> &'static str {
        match self {
            IdKind::Doi => "DOI",
            IdKind::ArXiv => "ArXiv",
            IdKind::Dblp => "DBLP",
        }
    }

    fn pick(self, ids: &ExternalIds) -> Option<&str> {
        let value = match self {
            IdKind::Doi => ids.doi.as_deref(),
            IdKind::ArXiv => ids.arxiv.as_deref(),
            IdKind::Dblp => ids.dblp.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Highest-priority identifier present, if any.
pub fn choose_identifier(ids: &ExternalIds) -> Option<(IdKind, &str)> {
    IdKind::PRIORITY
        .into_iter()
        .find_map(|kind| kind.pick(ids).map(|value| (kind, value)))
}

/// Tallies from one merge pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub doi: usize,
    pub arxiv: usize,
    pub dblp: usize,
    /// Display names of unresolved entries, in load order
    pub missing: Vec<String>,
}

impl MergeReport {
    pub fn total_updated(&self) -> usize {
        self.doi + self.arxiv + self.dblp
    }

    pub fn total_missing(&self) -> usize {
        self.missing.len()
    }

    pub fn total_processed(&self) -> usize {
        self.total_updated() + self.total_missing()
    }

    fn record(&mut self, kind: IdKind) {
        match kind {
            IdKind::Doi => self.doi += 1,
            IdKind::ArXiv => self.arxiv += 1,
            IdKind::Dblp => self.dblp += 1,
        }
    }
}

/// Apply batch results to the entries named in `corpus_map`.
///
/// Every key in `corpus_map` is counted exactly once, either as updated or
/// as missing.
pub fn merge_results(
    bib: &mut Bibliography,
    corpus_map: &CorpusMap,
    results: &BatchResult,
) -> MergeReport {
    let mut report = MergeReport::default();

    for (key, entry_key) in corpus_map.iter() {
        let Some(entry) = bib.get_mut(entry_key) else {
            warn!(entry = entry_key, corpus_id = %key, "Entry vanished before merge");
            report.missing.push(entry_key.to_string());
            continue;
        };

        let paper = results.get(key);
        let chosen = paper
            .and_then(|p| p.external_ids.as_ref())
            .and_then(choose_identifier);

        match chosen {
            Some((kind, value)) => {
                if let Some(title) = paper.and_then(|p| p.title.as_deref()) {
                    debug!(entry = entry_key, s2_title = title, "Matched paper");
                }
                // Entries with a DOI were never extracted, so the add only
                // declines for ArXiv/DBLP fields typed by hand.
                if bib::add_field(entry, kind.field_name(), value) {
                    info!(entry = entry_key, kind = %kind, value = value, "Added identifier");
                } else {
                    debug!(entry = entry_key, kind = %kind, "Identifier field already set");
                }
                report.record(kind);
            }
            None => {
                let name = bib::display_name(entry);
                if paper.is_none() {
                    warn!(entry = entry_key, corpus_id = %key, "No data returned");
                } else {
                    warn!(entry = entry_key, corpus_id = %key, "No DOI, ArXiv or DBLP id");
                }
                report.missing.push(name);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{self, CorpusKey};
    use crate::error::Result;
    use crate::semanticscholar::PaperIds;

    const BIB: &str = r#"
@article{one,
  title = {First Paper},
  url = {https://www.semanticscholar.org/paper/CorpusID:1}
}
@article{two,
  title = {Second Paper},
  url = {https://www.semanticscholar.org/paper/CorpusID:2}
}
@article{three,
  title = {Third Paper},
  url = {https://www.semanticscholar.org/paper/CorpusID:3}
}
@article{four,
  title = {Fourth Paper},
  url = {https://www.semanticscholar.org/paper/CorpusID:4}
}
@article{five,
  url = {https://www.semanticscholar.org/paper/CorpusID:5}
}
"#;

    fn ids(doi: Option<&str>, arxiv: Option<&str>, dblp: Option<&str>) -> PaperIds {
        PaperIds {
            paper_id: None,
            title: None,
            external_ids: Some(ExternalIds {
                doi: doi.map(String::from),
                arxiv: arxiv.map(String::from),
                dblp: dblp.map(String::from),
            }),
        }
    }

    fn key(id: &str) -> CorpusKey {
        CorpusKey::new(id).expect("numeric")
    }

    #[test]
    fn test_priority_order() {
        let all = ExternalIds {
            doi: Some("10.1/a".into()),
            arxiv: Some("2101.1".into()),
            dblp: Some("conf/a".into()),
        };
        assert_eq!(choose_identifier(&all), Some((IdKind::Doi, "10.1/a")));

        let no_doi = ExternalIds {
            doi: None,
            ..all.clone()
        };
        assert_eq!(choose_identifier(&no_doi), Some((IdKind::ArXiv, "2101.1")));

        let dblp_only = ExternalIds {
            dblp: Some("conf/a".into()),
            ..ExternalIds::default()
        };
        assert_eq!(choose_identifier(&dblp_only), Some((IdKind::Dblp, "conf/a")));

        let blank_doi = ExternalIds {
            doi: Some("  ".into()),
            ..dblp_only.clone()
        };
        assert_eq!(choose_identifier(&blank_doi), Some((IdKind::Dblp, "conf/a")));

        assert_eq!(choose_identifier(&ExternalIds::default()), None);
    }

    #[test]
    fn test_merge_sets_one_field_and_counts_reconcile() -> Result<()> {
        let mut bib = crate::bib::parse(BIB)?;
        let extraction = corpus::extract(&bib);

        let mut results = BatchResult::new();
        results.insert(key("1"), ids(Some("10.1/one"), Some("2101.00001"), None));
        results.insert(key("2"), ids(None, Some("2101.00002"), Some("conf/two")));
        results.insert(key("3"), ids(None, None, Some("conf/three")));
        results.insert(key("4"), ids(None, None, None));

        let report = merge_results(&mut bib, &extraction.corpus_map, &results);

        assert_eq!((report.doi, report.arxiv, report.dblp), (1, 1, 1));
        assert_eq!(report.total_updated(), 3);
        assert_eq!(report.missing, vec!["Fourth Paper".to_string(), "five".to_string()]);
        assert_eq!(
            report.total_updated() + report.total_missing(),
            extraction.corpus_map.len()
        );

        let one = bib.get("one").expect("entry");
        assert_eq!(bib::field(one, "doi").as_deref(), Some("10.1/one"));
        assert!(!bib::has_field(one, "arxiv"));

        let two = bib.get("two").expect("entry");
        assert_eq!(bib::field(two, "arxiv").as_deref(), Some("2101.00002"));
        assert!(!bib::has_field(two, "dblp"));

        let three = bib.get("three").expect("entry");
        assert_eq!(bib::field(three, "dblp").as_deref(), Some("conf/three"));

        let four = bib.get("four").expect("entry");
        assert!(!bib::has_field(four, "doi"));
        assert!(!bib::has_field(four, "arxiv"));
        assert!(!bib::has_field(four, "dblp"));
        Ok(())
    }

    #[test]
    fn test_merge_with_no_results_marks_everything_missing() -> Result<()> {
        let mut bib = crate::bib::parse(BIB)?;
        let extraction = corpus::extract(&bib);

        let report = merge_results(&mut bib, &extraction.corpus_map, &BatchResult::new());

        assert_eq!(report.total_updated(), 0);
        assert_eq!(report.total_missing(), 5);
        assert_eq!(report.missing[0], "First Paper");
        Ok(())
    }

    #[test]
    fn test_merge_twice_is_idempotent() -> Result<()> {
        let mut bib = crate::bib::parse(BIB)?;
        let extraction = corpus::extract(&bib);
        let mut results = BatchResult::new();
        results.insert(key("1"), ids(Some("10.1/one"), None, None));
        merge_results(&mut bib, &extraction.corpus_map, &results);

        let again = corpus::extract(&bib);
        assert!(again.corpus_map.get(&key("1")).is_none());
        assert_eq!(again.corpus_map.len(), 4);
        Ok(())
    }
}
