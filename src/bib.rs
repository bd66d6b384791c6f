//! BibTeX loading, writing and field access.
//!
//! Parsing and serialization are delegated to the `biblatex` crate. Field
//! names are matched case-insensitively, since `doi`, `DOI` and `Doi` all
//! mean the same thing to BibTeX.

use crate::error::{BibDoiError, Result};
use biblatex::{Bibliography, Chunk, Entry, Spanned};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix appended to the input file stem for the enriched copy
const OUTPUT_SUFFIX: &str = "_modified";

/// Read and parse a bibliography file.
pub fn load(path: &Path) -> Result<Bibliography> {
    let content = std::fs::read_to_string(path)?;
    let bib = parse(&content)?;
    info!(path = %path.display(), entries = bib.len(), "Loaded bibliography");
    Ok(bib)
}

/// Parse bibliography source text.
pub fn parse(content: &str) -> Result<Bibliography> {
    Bibliography::parse(content).map_err(|e| BibDoiError::Bib(e.to_string()))
}

/// Serialize the bibliography to `path` as BibTeX.
pub fn save(bib: &Bibliography, path: &Path) -> Result<()> {
    std::fs::write(path, bib.to_bibtex_string())?;
    info!(path = %path.display(), entries = bib.len(), "Wrote bibliography");
    Ok(())
}

/// `refs.bib` -> `refs_modified.bib`, in the same directory.
pub fn output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bibliography".to_string());
    input.with_file_name(format!("{}{}.bib", stem, OUTPUT_SUFFIX))
}

/// Flatten a list of chunks into plain text.
pub fn chunks_to_string(chunks: &[Spanned<Chunk>]) -> String {
    chunks
        .iter()
        .map(|c| match &c.v {
            Chunk::Normal(s) => s.as_str(),
            Chunk::Verbatim(s) => s.as_str(),
            Chunk::Math(s) => s.as_str(),
        })
        .collect()
}

/// Case-insensitive field lookup.
pub fn field(entry: &Entry, name: &str) -> Option<String> {
    entry
        .fields
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, chunks)| chunks_to_string(chunks))
}

pub fn has_field(entry: &Entry, name: &str) -> bool {
    entry.fields.keys().any(|key| key.eq_ignore_ascii_case(name))
}

/// Fields `biblatex` writes without LaTeX escaping. Keys must be lowercase
/// for the writer to recognise them.
const VERBATIM_FIELDS: &[&str] = &["doi", "url", "eprint", "file"];

/// Add a field unless one with the same name (in any case) already exists.
///
/// The key is stored lowercase, as `biblatex` stores parsed keys.
/// Returns `true` if the entry was changed.
pub fn add_field(entry: &mut Entry, name: &str, value: &str) -> bool {
    if has_field(entry, name) {
        debug!(key = %entry.key, field = name, "Field already present, leaving as is");
        return false;
    }

    let key = name.to_ascii_lowercase();
    let v = if VERBATIM_FIELDS.contains(&key.as_str()) {
        Chunk::Verbatim(value.to_string())
    } else {
        Chunk::Normal(value.to_string())
    };
    entry.fields.insert(key, vec![Spanned { v, span: 0..0 }]);
    true
}

/// Human-readable label for reports: the title if there is one, else the key.
pub fn display_name(entry: &Entry) -> String {
    field(entry, "title")
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| entry.key.clone())
}
