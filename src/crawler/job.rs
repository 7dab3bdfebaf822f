//! Crawl tasks, job events and the per-job handle
//!
//! A job's counters change only through [`JobHandle::record`]; its state only
//! through validated transitions. Observers take immutable [`JobSnapshot`]s.

use crate::crawler::frontier::Frontier;
use crate::crawler::parser::PageContext;
use crate::state::JobState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;
use uuid::Uuid;

/// Whether a task's response is expected to be a page or a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Page,
    File,
}

/// A URL scheduled for fetching within one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTask {
    pub url: Url,
    /// Link distance from the seed
    pub depth: u32,
    pub kind: TaskKind,
    pub job_id: Uuid,
    /// Hints from the page that linked to this document
    pub context: Option<PageContext>,
}

impl UrlTask {
    /// A depth-0 page task
    pub fn seed(url: Url, job_id: Uuid) -> Self {
        Self {
            url,
            depth: 0,
            kind: TaskKind::Page,
            job_id,
            context: None,
        }
    }

    /// A task discovered on this task's page
    pub fn child(&self, url: Url, kind: TaskKind, context: Option<PageContext>) -> Self {
        Self {
            url,
            depth: self.depth + 1,
            kind,
            job_id: self.job_id,
            context,
        }
    }
}

/// Things that happen to a job's tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// A popped task is about to be fetched
    Requested,
    /// A new article was catalogued
    Scraped,
    /// A task ended without a new article, for an expected reason
    Dropped { reason: String },
    /// A task ended because of a failure
    Failed { reason: String },
}

/// Job statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounters {
    pub requested: u64,
    pub scraped: u64,
    pub dropped: u64,
    pub errors: u64,
}

/// Point-in-time view of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub spider: String,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counters: JobCounters,
}

impl JobSnapshot {
    /// Elapsed time, up to now for jobs that have not finished
    pub fn total_time(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lifecycle {
    state: JobState,
    finished_at: Option<DateTime<Utc>>,
}

/// Shared handle to a running job
pub struct JobHandle {
    job_id: Uuid,
    spider: String,
    started_at: DateTime<Utc>,
    frontier: Arc<Frontier>,
    lifecycle: watch::Sender<Lifecycle>,
    requested: AtomicU64,
    scraped: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
}

impl JobHandle {
    pub fn new(job_id: Uuid, spider: impl Into<String>, frontier: Arc<Frontier>) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle {
            state: JobState::Pending,
            finished_at: None,
        });

        Self {
            job_id,
            spider: spider.into(),
            started_at: Utc::now(),
            frontier,
            lifecycle,
            requested: AtomicU64::new(0),
            scraped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn spider(&self) -> &str {
        &self.spider
    }

    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    pub fn state(&self) -> JobState {
        self.lifecycle.borrow().state
    }

    /// Applies one event to the counters
    pub fn record(&self, event: JobEvent) {
        match event {
            JobEvent::Requested => {
                self.requested.fetch_add(1, Ordering::Relaxed);
            }
            JobEvent::Scraped => {
                self.scraped.fetch_add(1, Ordering::Relaxed);
            }
            JobEvent::Dropped { reason } => {
                tracing::debug!(job = %self.job_id, "Dropped: {}", reason);
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            JobEvent::Failed { reason } => {
                tracing::warn!(job = %self.job_id, "Failed: {}", reason);
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Moves to `next` if the state machine allows it; returns whether it did
    pub fn transition(&self, next: JobState) -> bool {
        let moved = self.lifecycle.send_if_modified(|lifecycle| {
            if !lifecycle.state.can_transition_to(next) {
                return false;
            }
            lifecycle.state = next;
            if next.is_terminal() {
                lifecycle.finished_at = Some(Utc::now());
            }
            true
        });

        if moved {
            tracing::info!(job = %self.job_id, spider = %self.spider, "Job {}", next);
        }
        moved
    }

    /// Asks the job to stop: closes the frontier so idle workers exit, and
    /// lets in-flight fetches finish
    ///
    /// Returns false if the job had already finished or was already stopping.
    pub fn request_stop(&self) -> bool {
        let mut target = None;
        let stopped = self.lifecycle.send_if_modified(|lifecycle| {
            let next = match lifecycle.state {
                JobState::Pending => JobState::Stopped,
                JobState::Running => JobState::Stopping,
                _ => return false,
            };
            lifecycle.state = next;
            if next.is_terminal() {
                lifecycle.finished_at = Some(Utc::now());
            }
            target = Some(next);
            true
        });

        if let Some(next) = target {
            tracing::info!(job = %self.job_id, spider = %self.spider, "Job {}", next);
            self.frontier.stop();
        }
        stopped
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let lifecycle = *self.lifecycle.borrow();

        JobSnapshot {
            job_id: self.job_id,
            spider: self.spider.clone(),
            state: lifecycle.state,
            started_at: self.started_at,
            finished_at: lifecycle.finished_at,
            counters: JobCounters {
                requested: self.requested.load(Ordering::Relaxed),
                scraped: self.scraped.load(Ordering::Relaxed),
                dropped: self.dropped.load(Ordering::Relaxed),
                errors: self.errors.load(Ordering::Relaxed),
            },
        }
    }

    /// Resolves once the job reaches a terminal state
    pub async fn wait(&self) -> JobSnapshot {
        let mut receiver = self.lifecycle.subscribe();
        // The sender lives as long as `self`, so this cannot fail while we hold it
        let _ = receiver.wait_for(|lifecycle| lifecycle.state.is_terminal()).await;
        self.snapshot()
    }
}
