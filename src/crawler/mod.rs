//! Crawler module for document harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry and error classification
//! - Per-site link extraction rules and HTML parsing
//! - The per-job frontier and per-host politeness
//! - Job lifecycle, statistics and the worker pool

mod fetcher;
mod frontier;
mod job;
mod manager;
mod parser;
mod politeness;
mod rules;
mod worker;

pub use fetcher::{
    build_http_client, classify_content, fetch_once, fetch_with_retry, ContentKind, FetchError,
    FetchResult, RetryPolicy,
};
pub use frontier::{Frontier, Lease};
pub use job::{JobCounters, JobEvent, JobHandle, JobSnapshot, TaskKind, UrlTask};
pub use manager::JobManager;
pub use parser::{parse_page, PageContext, ParsedPage};
pub use politeness::Politeness;
pub use rules::{
    build_spiders, builtin_rules_kind, ExtractedLinks, GovSiteRules, Link, SelectorRules,
    SiteRules, SpiderSpec, WhoSiteRules, GOV_SPIDER, WHO_SPIDER,
};

use crate::store::StoreError;
use crate::ConfigError;
use thiserror::Error;

/// Errors from starting or managing crawl jobs
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Spider '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Unknown spider '{0}'")]
    UnknownSpider(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Spider configuration error: {0}")]
    Config(#[from] ConfigError),
}
