//! Semantic Scholar API Client
//!
//! Looks up external identifiers (DOI, ArXiv, DBLP) for papers by corpus id.
//!
//! API Details:
//! - Batch endpoint: POST /graph/v1/paper/batch
//! - Max 500 papers per request
//! - Response array is positionally aligned with the request ids, `null` for unknown ids
//! - Rate limit: 1 req/s (unauthenticated), higher with API key
//!
//! Each chunk runs through a small retry state machine. A 429 is retried after
//! the server's Retry-After (or a default wait), a connection fault or timeout
//! after a fixed delay, and both share one attempt budget. Any other error
//! status gives up on the chunk immediately. A chunk that fails for whatever
//! reason simply contributes nothing to the result.

use crate::config::FetchConfig;
use crate::corpus::CorpusKey;
use crate::error::{BibDoiError, Result};
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fields requested from the batch endpoint
const BATCH_FIELDS: &str = "externalIds,title";

/// Upper bound on a server-directed wait
const MAX_RETRY_WAIT: Duration = Duration::from_secs(60);

/// External identifiers attached to a paper
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExternalIds {
    #[serde(rename = "DOI", default)]
    pub doi: Option<String>,
    #[serde(rename = "ArXiv", default)]
    pub arxiv: Option<String>,
    #[serde(rename = "DBLP", default)]
    pub dblp: Option<String>,
}

/// One element of the batch response
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaperIds {
    #[serde(rename = "paperId", default)]
    pub paper_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "externalIds", default)]
    pub external_ids: Option<ExternalIds>,
}

/// Papers found, keyed by the corpus key that was asked for.
/// Keys with no data are absent.
pub type BatchResult = HashMap<CorpusKey, PaperIds>;

/// URL of the single-paper endpoint, kept for one-off lookups.
/// The pipeline always goes through the batch endpoint.
pub fn single_paper_url(base_url: &str, key: &CorpusKey) -> String {
    format!("{}/paper/{}?fields={}", base_url, key, BATCH_FIELDS)
}

fn batch_url(base_url: &str) -> String {
    format!("{}/paper/batch?fields={}", base_url, BATCH_FIELDS)
}

// === Transport seam ===

/// What came back from one HTTP exchange
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: String,
}

/// Sends a batch request. `Err` means no status line was received at all
/// (connection refused, reset, timed out).
pub trait Transport {
    fn post_batch(&self, url: &str, ids: &[&str]) -> Result<HttpReply>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post_batch(&self, url: &str, ids: &[&str]) -> Result<HttpReply> {
        (**self).post_batch(url, ids)
    }
}

/// Blocking reqwest transport
pub struct HttpTransport {
    client: Client,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("bibdoi/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
        })
    }
}

impl Transport for HttpTransport {
    fn post_batch(&self, url: &str, ids: &[&str]) -> Result<HttpReply> {
        let body = serde_json::json!({ "ids": ids });

        debug!(url = %url, count = ids.len(), "Sending batch request");

        let mut request = self.client.post(url).json(&body);

        // Add API key header if provided
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .map_err(|e| BibDoiError::Transient(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response
            .text()
            .map_err(|e| BibDoiError::Transient(e.to_string()))?;

        Ok(HttpReply {
            status,
            retry_after,
            body,
        })
    }
}

/// Parse a Retry-After header value given in seconds, capped at `MAX_RETRY_WAIT`.
///
/// The HTTP-date form yields `None`, which makes the caller use its default wait.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(secs.min(MAX_RETRY_WAIT.as_secs_f64())))
}

/// Parse the positional batch response body.
pub fn parse_batch_body(body: &str) -> Result<Vec<Option<PaperIds>>> {
    Ok(serde_json::from_str(body)?)
}

// === Clock seam ===

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Blocks the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// === Retry state machine ===

#[derive(Debug)]
enum RetryState {
    Attempt,
    RateLimited(Option<Duration>),
    TransientError(String),
    Success(Vec<Option<PaperIds>>),
    Exhausted,
}

/// How a single chunk ended
#[derive(Debug)]
pub enum ChunkOutcome {
    /// Positional response, one slot per requested id
    Success(Vec<Option<PaperIds>>),
    /// Non-retryable failure (error status or unreadable body)
    Failed(String),
    /// Every attempt was rate limited or hit a network fault
    Exhausted { attempts: u32 },
}

/// Number of chunks `total` ids split into at `batch_size` per chunk.
pub fn chunk_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size.max(1))
}

/// Sequential batch fetcher
pub struct BatchFetcher<T, S> {
    transport: T,
    sleeper: S,
    config: FetchConfig,
}

impl BatchFetcher<HttpTransport, ThreadSleeper> {
    /// Fetcher talking to the real API
    pub fn from_config(config: FetchConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(transport, ThreadSleeper, config))
    }
}

impl<T: Transport, S: Sleeper> BatchFetcher<T, S> {
    pub fn new(transport: T, sleeper: S, config: FetchConfig) -> Self {
        Self {
            transport,
            sleeper,
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Look up every key, one chunk at a time, in the order given.
    ///
    /// Never fails: chunks that cannot be fetched contribute no entries.
    pub fn fetch_all(&self, keys: &[CorpusKey]) -> BatchResult {
        let mut results = BatchResult::new();
        if keys.is_empty() {
            return results;
        }

        let batch_size = self.config.batch_size();
        let total_batches = chunk_count(keys.len(), batch_size);

        info!(
            total = keys.len(),
            batches = total_batches,
            chunk_size = batch_size,
            "Starting Semantic Scholar batch lookup"
        );

        for (batch_idx, chunk) in keys.chunks(batch_size).enumerate() {
            info!(
                batch = batch_idx + 1,
                total_batches = total_batches,
                papers = chunk.len(),
                "Processing batch"
            );

            match self.fetch_chunk(chunk) {
                ChunkOutcome::Success(papers) => {
                    let found = collect_positional(chunk, papers, &mut results);
                    info!(batch = batch_idx + 1, found = found, "Batch completed");
                }
                ChunkOutcome::Failed(reason) => {
                    warn!(batch = batch_idx + 1, error = %reason, "Batch failed");
                }
                ChunkOutcome::Exhausted { attempts } => {
                    warn!(batch = batch_idx + 1, attempts = attempts, "Batch gave up after retries");
                }
            }

            if batch_idx + 1 < total_batches {
                self.sleeper.sleep(self.config.inter_batch_delay);
            }
        }

        info!(total_found = results.len(), "Semantic Scholar lookup complete");

        results
    }

    /// Run one chunk through the retry state machine.
    pub fn fetch_chunk(&self, chunk: &[CorpusKey]) -> ChunkOutcome {
        let url = batch_url(&self.config.base_url);
        let ids: Vec<&str> = chunk.iter().map(CorpusKey::as_str).collect();
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempts = 0u32;
        let mut state = RetryState::Attempt;

        loop {
            state = match state {
                RetryState::Attempt => {
                    attempts += 1;
                    match self.transport.post_batch(&url, &ids) {
                        Ok(reply) if reply.status == 429 => RetryState::RateLimited(reply.retry_after),
                        Ok(reply) if (200..300).contains(&reply.status) => {
                            match parse_batch_body(&reply.body) {
                                Ok(papers) => RetryState::Success(papers),
                                Err(e) => return ChunkOutcome::Failed(e.to_string()),
                            }
                        }
                        Ok(reply) => {
                            let err = BibDoiError::Api {
                                code: reply.status,
                                message: reply.body.chars().take(200).collect(),
                            };
                            warn!(status = reply.status, error = %err, "API error, not retrying");
                            return ChunkOutcome::Failed(err.to_string());
                        }
                        Err(e) => RetryState::TransientError(e.to_string()),
                    }
                }
                RetryState::RateLimited(retry_after) => {
                    if attempts >= max_attempts {
                        RetryState::Exhausted
                    } else {
                        let wait = retry_after.unwrap_or(self.config.default_retry_wait);
                        warn!(
                            attempt = attempts,
                            wait_secs = wait.as_secs_f64(),
                            "Rate limited, waiting"
                        );
                        self.sleeper.sleep(wait);
                        RetryState::Attempt
                    }
                }
                RetryState::TransientError(reason) => {
                    if attempts >= max_attempts {
                        RetryState::Exhausted
                    } else {
                        warn!(
                            attempt = attempts,
                            error = %reason,
                            wait_secs = self.config.transient_delay.as_secs_f64(),
                            "Request failed, retrying"
                        );
                        self.sleeper.sleep(self.config.transient_delay);
                        RetryState::Attempt
                    }
                }
                RetryState::Success(papers) => return ChunkOutcome::Success(papers),
                RetryState::Exhausted => return ChunkOutcome::Exhausted { attempts },
            };
        }
    }
}

/// Pair the i-th requested key with the i-th response slot. Returns how many
/// slots carried data.
fn collect_positional(
    chunk: &[CorpusKey],
    papers: Vec<Option<PaperIds>>,
    results: &mut BatchResult,
) -> usize {
    if papers.len() != chunk.len() {
        warn!(
            requested = chunk.len(),
            returned = papers.len(),
            "Response length does not match request, pairing what lines up"
        );
    }

    let mut found = 0;
    for (key, paper) in chunk.iter().zip(papers) {
        if let Some(paper) = paper {
            results.insert(key.clone(), paper);
            found += 1;
        }
    }
    found
}
