//! Crawl worker: fetch, classify, then parse or save
//!
//! Every outcome of a task is reported to the job as a [`JobEvent`]; workers
//! never touch the counters directly.

use crate::crawler::fetcher::{classify_content, fetch_with_retry, ContentKind, FetchError, FetchResult, RetryPolicy};
use crate::crawler::frontier::Frontier;
use crate::crawler::job::{JobEvent, JobHandle, UrlTask};
use crate::crawler::parser::parse_page;
use crate::crawler::politeness::Politeness;
use crate::crawler::rules::SiteRules;
use crate::store::{content_hash, Article, ContentStore, RecordOutcome};
use reqwest::Client;
use std::sync::Arc;

/// Everything a worker of one job shares with its siblings
pub(crate) struct WorkerContext {
    pub client: Client,
    pub store: ContentStore,
    pub rules: Arc<dyn SiteRules>,
    pub retry: RetryPolicy,
    pub politeness: Arc<Politeness>,
    pub file_types: Vec<String>,
    pub max_depth: u32,
    pub max_body_bytes: u64,
    pub job: Arc<JobHandle>,
    pub frontier: Arc<Frontier>,
}

/// Pops and processes tasks until the frontier is stopped or drained
pub(crate) async fn run_worker(ctx: Arc<WorkerContext>, worker_id: usize) {
    tracing::debug!(job = %ctx.job.job_id(), "Worker {} started", worker_id);

    while let Some(lease) = ctx.frontier.pop().await {
        process_task(&ctx, lease.task()).await;
        lease.complete();
    }

    tracing::debug!(job = %ctx.job.job_id(), "Worker {} finished", worker_id);
}

async fn process_task(ctx: &WorkerContext, task: &UrlTask) {
    tracing::debug!("Fetching {} (depth {}, {:?})", task.url, task.depth, task.kind);
    ctx.job.record(JobEvent::Requested);

    let result = match fetch_with_retry(
        &ctx.client,
        &task.url,
        &ctx.retry,
        &ctx.politeness,
        ctx.max_body_bytes,
    )
    .await
    {
        Ok(result) => result,
        Err(FetchError::Transient(reason)) => {
            ctx.job.record(JobEvent::Failed {
                reason: format!("{}: {} (gave up after {} attempts)", task.url, reason, ctx.retry.max_attempts),
            });
            return;
        }
        Err(FetchError::Permanent(reason)) => {
            ctx.job.record(JobEvent::Dropped {
                reason: format!("{}: {}", task.url, reason),
            });
            return;
        }
    };

    match classify_content(&result.content_type, &result.url, &ctx.file_types) {
        ContentKind::Page => handle_page(ctx, task, &result),
        ContentKind::File { extension } => save_document(ctx, task, &result, &extension).await,
        ContentKind::Unsupported => {
            tracing::warn!(
                "Dropping {}: unsupported content type '{}'",
                task.url,
                result.content_type
            );
            ctx.job.record(JobEvent::Dropped {
                reason: format!("{}: unsupported content type '{}'", task.url, result.content_type),
            });
        }
    }
}

/// Parses a page and schedules the tasks found on it
fn handle_page(ctx: &WorkerContext, task: &UrlTask, result: &FetchResult) {
    let html = String::from_utf8_lossy(&result.body);
    let parsed = parse_page(&html, &result.url, ctx.rules.as_ref(), task);

    let mut scheduled = 0;
    for child in parsed.follow.into_iter().chain(parsed.files) {
        if child.depth > ctx.max_depth {
            tracing::debug!("Not scheduling {}: beyond max depth {}", child.url, ctx.max_depth);
            continue;
        }
        if ctx.frontier.push(child) {
            scheduled += 1;
        }
    }

    tracing::debug!("Parsed {}: {} new tasks", result.url, scheduled);
}

/// Saves a document once per unique content
async fn save_document(ctx: &WorkerContext, task: &UrlTask, result: &FetchResult, extension: &str) {
    let file_hash = content_hash(&result.body);

    match ctx.store.is_scraped(&file_hash) {
        Ok(true) => {
            ctx.job.record(JobEvent::Dropped {
                reason: format!("{}: duplicate content {}", task.url, file_hash),
            });
            return;
        }
        Ok(false) => {}
        Err(e) => {
            tracing::error!("Store lookup failed for {}: {}", task.url, e);
            ctx.job.record(JobEvent::Failed {
                reason: format!("{}: {}", task.url, e),
            });
            return;
        }
    }

    let local_path = match ctx.store.save_blob(&file_hash, extension, &result.body).await {
        Ok(path) => path,
        Err(e) => {
            tracing::error!("Failed to write {}: {}", task.url, e);
            ctx.job.record(JobEvent::Failed {
                reason: format!("{}: {}", task.url, e),
            });
            return;
        }
    };

    let context = task.context.clone().unwrap_or_default();
    let article = Article {
        title: context.title,
        uri: task.url.to_string(),
        file_hash,
        local_path: local_path.to_string_lossy().into_owned(),
        sections: Default::default(),
        keywords: context.keywords,
    };

    match ctx.store.record_article(&article, task.url.as_str()) {
        Ok(RecordOutcome::Inserted) => {
            tracing::info!("Saved {} as {}", task.url, article.file_hash);
            ctx.job.record(JobEvent::Scraped);
        }
        Ok(RecordOutcome::Duplicate) => {
            ctx.job.record(JobEvent::Dropped {
                reason: format!("{}: duplicate content {}", task.url, article.file_hash),
            });
        }
        Err(e) => {
            tracing::error!("Failed to record {}: {}", task.url, e);
            ctx.job.record(JobEvent::Failed {
                reason: format!("{}: {}", task.url, e),
            });
        }
    }
}
