use serde::Serialize;
use uuid::Uuid;

use crate::crawler::JobSnapshot;
use crate::state::JobState;

/// Success envelope: `{"data": ...}`
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Error envelope: `{"errors": [...]}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RouteInfo {
    pub url: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub project: String,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub routes: Vec<RouteInfo>,
    pub meta: Meta,
}

// ---------------------------------------------------------------------------
// Spiders
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SpiderList {
    pub spiders: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RunStarted {
    pub status: &'static str,
    pub spider: String,
    pub job_id: Uuid,
}

// ---------------------------------------------------------------------------
// Crawls
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CrawlEntry {
    pub job_id: Uuid,
    pub spider: String,
    pub state: JobState,
    /// RFC 3339 UTC timestamp
    pub start_time: String,
    /// Elapsed seconds, up to now for running jobs
    pub total_time: f64,
    pub total_requests: u64,
    pub item_scraped: u64,
    pub item_dropped: u64,
    pub errors: u64,
}

impl From<JobSnapshot> for CrawlEntry {
    fn from(snapshot: JobSnapshot) -> Self {
        let total_time = snapshot
            .total_time()
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;

        Self {
            job_id: snapshot.job_id,
            spider: snapshot.spider,
            state: snapshot.state,
            start_time: snapshot.started_at.to_rfc3339(),
            total_time,
            total_requests: snapshot.counters.requested,
            item_scraped: snapshot.counters.scraped,
            item_dropped: snapshot.counters.dropped,
            errors: snapshot.counters.errors,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CrawlList {
    pub spiders: Vec<CrawlEntry>,
}

#[derive(Debug, Serialize)]
pub struct StopResult {
    pub status: &'static str,
    pub stopped: usize,
}
