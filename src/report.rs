//! End-of-run summary.

use crate::corpus::ExtractionStats;
use crate::merge::MergeReport;
use std::fmt;
use std::path::PathBuf;

/// Unresolved titles listed before the listing is cut off
pub const MISSING_PREVIEW: usize = 10;

const RULE_WIDTH: usize = 110;

#[derive(Debug, Clone)]
pub struct Summary {
    pub extraction: ExtractionStats,
    pub merge: MergeReport,
    pub output: PathBuf,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        let m = &self.merge;
        let x = &self.extraction;

        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            "Found [{} / {}] identifiers",
            m.total_updated(),
            m.total_processed()
        )?;
        writeln!(f, "  Entries in file:      {}", x.total_entries)?;
        writeln!(f, "  Already had DOI:      {}", x.with_doi)?;
        writeln!(f, "  No corpus id:         {}", x.without_corpus_id)?;
        if x.malformed > 0 {
            writeln!(f, "  Malformed corpus id:  {}", x.malformed)?;
        }
        if x.collisions > 0 {
            writeln!(f, "  Duplicate corpus id:  {}", x.collisions)?;
        }
        writeln!(f, "  Looked up:            {}", m.total_processed())?;
        writeln!(f, "  Added DOI:            {}", m.doi)?;
        writeln!(f, "  Added ArXiv:          {}", m.arxiv)?;
        writeln!(f, "  Added DBLP:           {}", m.dblp)?;
        writeln!(f, "  Missing:              {}", m.total_missing())?;

        if !m.missing.is_empty() {
            writeln!(f, "Missing ones are:")?;
            for title in m.missing.iter().take(MISSING_PREVIEW) {
                writeln!(f, "  ? {}", title)?;
            }
            let hidden = m.missing.len().saturating_sub(MISSING_PREVIEW);
            if hidden > 0 {
                writeln!(f, "  ... and {} more", hidden)?;
            }
        }

        writeln!(f, "{}", rule)?;
        write!(f, "Wrote {}", self.output.display())
    }
}
