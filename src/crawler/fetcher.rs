//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Retry with exponential backoff for transient failures
//! - Error classification (transient vs permanent)
//! - Content-Type classification of successful responses

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::politeness::Politeness;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed for a single request
const MAX_REDIRECTS: usize = 10;

/// A successfully retrieved response
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Final URL after redirects
    pub url: Url,
    pub status_code: u16,
    /// Content-Type header value, empty if absent
    pub content_type: String,
    pub body: Vec<u8>,
    /// Time spent on the successful attempt
    pub elapsed: Duration,
}

/// Why a fetch did not produce a response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Worth retrying: timeouts, connection failures, 5xx, 429
    #[error("transient failure: {0}")]
    Transient(String),

    /// Retrying will not help: 4xx, malformed URL, redirect errors
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Transient(reason) | Self::Permanent(reason) => reason,
        }
    }
}

/// Exponential backoff schedule for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay before retrying after the given failed attempt (1-based):
    /// `base * 2^(attempt-1)`, capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// What a response should be treated as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    /// HTML to hand to the page parser
    Page,
    /// A document to save, with the file extension to store it under
    File { extension: String },
    /// Anything else; dropped
    Unsupported,
}

/// Builds an HTTP client with proper configuration
///
/// The user agent follows `CrawlerName/Version (+ContactURL; ContactEmail)`.
/// Redirects are followed up to ten hops; a longer chain or a loop is a
/// permanent failure.
///
/// # Example
///
/// ```no_run
/// use wsf_scraper::config::{CrawlerConfig, UserAgentConfig};
/// use wsf_scraper::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "WSF-Scraper".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, retrying transient failures per `policy`
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Timeout, connection error, body read error | Retry |
/// | HTTP 5xx, HTTP 429 | Retry |
/// | Other HTTP 4xx | Fail immediately |
/// | Redirect loop / too many redirects | Fail immediately |
/// | Malformed request | Fail immediately |
///
/// Every attempt, retries included, first waits for the host's politeness
/// slot; the backoff delay comes on top of it.
///
/// Returns the last transient error once attempts are exhausted.
pub async fn fetch_with_retry(
    client: &Client,
    url: &Url,
    policy: &RetryPolicy,
    politeness: &Politeness,
    max_body_bytes: u64,
) -> Result<FetchResult, FetchError> {
    let mut attempt = 1;

    loop {
        politeness.wait(url).await;

        match fetch_once(client, url, max_body_bytes).await {
            Ok(result) => return Ok(result),
            Err(FetchError::Transient(reason)) if attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    url,
                    reason,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Performs a single GET and classifies the outcome
///
/// Bodies larger than `max_body_bytes` are a permanent failure. A declared
/// `Content-Length` over the limit is refused before reading; otherwise the
/// body is read chunk by chunk and abandoned once it passes the limit.
pub async fn fetch_once(
    client: &Client,
    url: &Url,
    max_body_bytes: u64,
) -> Result<FetchResult, FetchError> {
    let started = Instant::now();

    let mut response = client
        .get(url.clone())
        .send()
        .await
        .map_err(classify_error)?;

    let status = response.status();
    if let Some(error) = classify_status(status) {
        return Err(error);
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if let Some(length) = response.content_length() {
        if length > max_body_bytes {
            return Err(oversized(length, max_body_bytes));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::Transient(format!("failed to read body: {e}")))?
    {
        let read = (body.len() + chunk.len()) as u64;
        if read > max_body_bytes {
            return Err(oversized(read, max_body_bytes));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(FetchResult {
        url: final_url,
        status_code: status.as_u16(),
        content_type,
        body,
        elapsed: started.elapsed(),
    })
}

fn oversized(length: u64, limit: u64) -> FetchError {
    FetchError::Permanent(format!(
        "body of {length} bytes exceeds the {limit} byte limit"
    ))
}

/// Maps a non-success status to a fetch error
fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    let reason = format!("HTTP {}", status.as_u16());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Some(FetchError::Transient(reason))
    } else {
        Some(FetchError::Permanent(reason))
    }
}

/// Maps a transport error to a fetch error
fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_builder() || e.is_redirect() {
        FetchError::Permanent(e.to_string())
    } else if e.is_timeout() {
        FetchError::Transient("request timeout".to_string())
    } else if e.is_connect() {
        FetchError::Transient(format!("connection failed: {e}"))
    } else if e.is_body() || e.is_request() {
        FetchError::Transient(e.to_string())
    } else {
        FetchError::Permanent(e.to_string())
    }
}

/// Classifies a response by its Content-Type
///
/// `text/html` is a page; a type listed in `file_types` is a document, stored
/// under the URL's own extension when it has one.
pub fn classify_content(content_type: &str, url: &Url, file_types: &[String]) -> ContentKind {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if mime == "text/html" || mime == "application/xhtml+xml" {
        return ContentKind::Page;
    }

    if mime.is_empty() || !file_types.iter().any(|t| t.eq_ignore_ascii_case(&mime)) {
        return ContentKind::Unsupported;
    }

    let extension = url_extension(url)
        .or_else(|| extension_for_mime(&mime).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());

    ContentKind::File { extension }
}

fn url_extension(url: &Url) -> Option<String> {
    let name = crate::url::file_name_of(url)?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "application/vnd.ms-excel" => Some("xls"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some("xlsx"),
        "text/csv" => Some("csv"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}
