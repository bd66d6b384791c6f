//! Custom error types for bibdoi.
//!
//! All library functions return `Result<T, BibDoiError>` instead of using `unwrap()`.
//! Only I/O and bibliography errors are allowed to end a run; everything the
//! network produces is recovered inside the fetcher.

use thiserror::Error;

/// Main error type for bibdoi operations.
#[derive(Debug, Error)]
pub enum BibDoiError {
    /// HTTP client construction or request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Connection dropped, timed out, or otherwise failed before a status arrived
    #[error("Transient network fault: {0}")]
    Transient(String),

    /// External API returned an error status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Response body or reason
        message: String,
    },

    /// Malformed identifier or response payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// BibTeX input could not be parsed
    #[error("Bibliography error: {0}")]
    Bib(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using `BibDoiError`
pub type Result<T> = std::result::Result<T, BibDoiError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| BibDoiError::Parse(msg.to_string()))
    }
}
