use serde::Deserialize;

/// Main configuration structure for WSF Scraper
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Spider overrides and additional selector-driven spiders
    #[serde(default, rename = "spider")]
    pub spiders: Vec<SpiderConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent fetch workers per job
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Maximum link depth followed from a seed URL
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Total attempts for a transiently failing request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles on every further attempt (milliseconds)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single retry delay (milliseconds)
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Minimum time between two requests to the same host (milliseconds)
    #[serde(default)]
    pub politeness_delay_ms: u64,

    /// Content types saved as documents
    #[serde(default = "default_file_types")]
    pub file_types: Vec<String>,

    /// Largest response body read into memory; bigger responses are dropped
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_depth: default_max_depth(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            politeness_delay_ms: 0,
            file_types: default_file_types(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_concurrency() -> u32 {
    8
}

fn default_max_depth() -> u32 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_file_types() -> Vec<String> {
    vec!["application/pdf".to_string()]
}

fn default_max_body_bytes() -> u64 {
    50 * 1024 * 1024
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Catalog and blob storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite catalog database
    pub database_path: String,

    /// Directory downloaded documents are written to
    pub blob_dir: String,

    /// Rows fetched per page while exporting
    #[serde(default = "default_export_page_size")]
    pub export_page_size: u32,
}

fn default_export_page_size() -> u32 {
    500
}

/// Control API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the control API listens on
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Which link-extraction strategy a spider uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RulesKind {
    /// gov.uk policy listings
    Gov,
    /// WHO IRIS repository listings
    Who,
    /// Selectors supplied entirely by configuration
    Custom,
}

/// A spider entry
///
/// An entry named after a built-in spider overrides its seeds or selectors;
/// any other name declares a new spider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SpiderConfig {
    /// Spider name used to start jobs
    pub name: String,

    /// Link-extraction strategy; built-in names imply their own
    #[serde(default)]
    pub rules: Option<RulesKind>,

    /// Seed URLs (built-in spiders fall back to their defaults)
    #[serde(default)]
    pub seeds: Vec<String>,

    /// CSS selector for links to crawl as pages
    #[serde(default)]
    pub follow_selector: Option<String>,

    /// CSS selector for links to download as documents
    #[serde(default)]
    pub file_selector: Option<String>,

    /// CSS selector for the next listing page
    #[serde(default)]
    pub next_selector: Option<String>,
}
