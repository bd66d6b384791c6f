//! Fetcher configuration.
//!
//! Defaults follow the unauthenticated Semantic Scholar limits. The batch
//! endpoint accepts at most 500 ids per request, so larger batch sizes are
//! clamped rather than rejected.

use crate::error::{BibDoiError, Result};
use std::time::Duration;
use tracing::warn;

/// Semantic Scholar Graph API base URL
pub const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Maximum papers per batch request
pub const MAX_BATCH_SIZE: usize = 500;

/// Environment variable holding an optional API key
pub const API_KEY_ENV: &str = "S2_API_KEY";

/// Environment variable overriding the API base URL
pub const API_BASE_ENV: &str = "S2_API_BASE";

/// Settings for the batch fetcher and its retry loop
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Identifiers per request, always within `1..=MAX_BATCH_SIZE`
    batch_size: usize,
    /// Total attempts per chunk, shared by rate-limit and transient retries
    pub max_attempts: u32,
    /// Wait used after a 429 without a usable Retry-After header
    pub default_retry_wait: Duration,
    /// Wait after a connection error or timeout
    pub transient_delay: Duration,
    /// Fixed pause between consecutive chunks
    pub inter_batch_delay: Duration,
    /// Per-request timeout
    pub timeout: Duration,
    /// Sent as `x-api-key` when present
    pub api_key: Option<String>,
    /// API root without a trailing slash
    pub base_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            max_attempts: 3,
            default_retry_wait: Duration::from_secs(3),
            transient_delay: Duration::from_secs(1),
            inter_batch_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
            api_key: None,
            base_url: SS_API_BASE.to_string(),
        }
    }
}

impl FetchConfig {
    /// Build a config from the environment (`S2_API_KEY`, `S2_API_BASE`).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim();
            if !key.is_empty() {
                config.api_key = Some(key.to_string());
            }
        }

        if let Ok(base) = std::env::var(API_BASE_ENV) {
            config = config.with_base_url(&base)?;
        }

        Ok(config)
    }

    /// Set the batch size, clamping it into `1..=MAX_BATCH_SIZE`.
    pub fn with_batch_size(mut self, requested: usize) -> Self {
        self.batch_size = clamp_batch_size(requested);
        self
    }

    /// Point the fetcher at a different API root. Must be an absolute http(s) URL.
    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        let parsed = url::Url::parse(base.trim())
            .map_err(|e| BibDoiError::Config(format!("Invalid API base URL '{}': {}", base, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BibDoiError::Config(format!(
                "API base URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }

        self.base_url = parsed.as_str().trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Clamp a requested batch size into the range the batch endpoint accepts.
///
/// Out-of-range values produce a warning, never an error.
pub fn clamp_batch_size(requested: usize) -> usize {
    if requested > MAX_BATCH_SIZE {
        warn!(
            requested,
            max = MAX_BATCH_SIZE,
            "Batch size exceeds API limit, clamping"
        );
        MAX_BATCH_SIZE
    } else if requested == 0 {
        warn!("Batch size of 0 is not usable, using 1");
        1
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            let buf = self.0.lock().expect("log buffer lock");
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn with_captured_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs.contents())
    }

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.batch_size(), 500);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.default_retry_wait, Duration::from_secs(3));
        assert_eq!(config.inter_batch_delay, Duration::from_millis(500));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_batch_size_clamp() {
        assert_eq!(FetchConfig::default().with_batch_size(1000).batch_size(), 500);
        assert_eq!(FetchConfig::default().with_batch_size(500).batch_size(), 500);
        assert_eq!(FetchConfig::default().with_batch_size(42).batch_size(), 42);
        assert_eq!(FetchConfig::default().with_batch_size(0).batch_size(), 1);
    }

    #[test]
    fn test_oversized_batch_size_warns() {
        let (size, logs) = with_captured_logs(|| clamp_batch_size(1000));
        assert_eq!(size, 500);
        assert!(logs.contains("WARN"), "{}", logs);
        assert!(logs.contains("clamping"), "{}", logs);
    }

    #[test]
    fn test_valid_batch_size_is_silent() {
        let (size, logs) = with_captured_logs(|| clamp_batch_size(100));
        assert_eq!(size, 100);
        assert!(logs.is_empty(), "{}", logs);
    }

    #[test]
    fn test_base_url_override() -> Result<()> {
        let config = FetchConfig::default().with_base_url("http://127.0.0.1:8080/graph/v1/")?;
        assert_eq!(config.base_url, "http://127.0.0.1:8080/graph/v1");
        Ok(())
    }

    #[test]
    fn test_base_url_rejects_garbage() {
        assert!(FetchConfig::default().with_base_url("not a url").is_err());
        assert!(FetchConfig::default().with_base_url("ftp://example.com").is_err());
    }
}
