//! Job manager: starts, stops and reports crawl jobs
//!
//! At most one job per spider is active at a time. The manager keeps the
//! latest job of every spider so finished runs stay visible in listings.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::{build_http_client, RetryPolicy};
use crate::crawler::frontier::Frontier;
use crate::crawler::job::{JobHandle, JobSnapshot, UrlTask};
use crate::crawler::politeness::Politeness;
use crate::crawler::rules::{build_spiders, SpiderSpec};
use crate::crawler::worker::{run_worker, WorkerContext};
use crate::crawler::JobError;
use crate::state::JobState;
use crate::store::ContentStore;
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Owns every crawl job of the process
pub struct JobManager {
    client: Client,
    store: ContentStore,
    crawler: CrawlerConfig,
    spiders: BTreeMap<String, SpiderSpec>,
    politeness: Arc<Politeness>,
    jobs: Mutex<BTreeMap<String, Arc<JobHandle>>>,
}

impl JobManager {
    /// Builds the shared HTTP client and the spider registry
    pub fn new(config: &Config, store: ContentStore) -> Result<Self, JobError> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;
        let spiders = build_spiders(&config.spiders)?;

        tracing::info!(
            "Job manager ready: {} spiders, concurrency {}",
            spiders.len(),
            config.crawler.concurrency
        );

        Ok(Self {
            client,
            store,
            crawler: config.crawler.clone(),
            spiders,
            politeness: Arc::new(Politeness::new(Duration::from_millis(
                config.crawler.politeness_delay_ms,
            ))),
            jobs: Mutex::new(BTreeMap::new()),
        })
    }

    fn jobs(&self) -> MutexGuard<'_, BTreeMap<String, Arc<JobHandle>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Names of all runnable spiders
    pub fn spiders(&self) -> Vec<String> {
        self.spiders.keys().cloned().collect()
    }

    /// Starts a job for `spider`
    ///
    /// Fails if the spider is unknown or already has an active job. The check
    /// and the registration happen under one lock, so two concurrent starts of
    /// the same spider cannot both succeed.
    pub fn start(&self, spider: &str) -> Result<JobSnapshot, JobError> {
        let spec = self
            .spiders
            .get(spider)
            .ok_or_else(|| JobError::UnknownSpider(spider.to_string()))?;

        let handle = {
            let mut jobs = self.jobs();
            if jobs.get(spider).is_some_and(|job| job.state().is_active()) {
                return Err(JobError::AlreadyRunning(spider.to_string()));
            }

            let job_id = Uuid::new_v4();
            let frontier = Arc::new(Frontier::new());
            for seed in &spec.seeds {
                frontier.push(UrlTask::seed(seed.clone(), job_id));
            }

            let handle = Arc::new(JobHandle::new(job_id, spider, frontier));
            jobs.insert(spider.to_string(), Arc::clone(&handle));
            handle
        };

        tracing::info!(
            job = %handle.job_id(),
            "Starting spider {} with {} seeds",
            spider,
            spec.seeds.len()
        );

        let ctx = Arc::new(WorkerContext {
            client: self.client.clone(),
            store: self.store.clone(),
            rules: Arc::clone(&spec.rules),
            retry: RetryPolicy::from_config(&self.crawler),
            politeness: Arc::clone(&self.politeness),
            file_types: self.crawler.file_types.clone(),
            max_depth: self.crawler.max_depth,
            max_body_bytes: self.crawler.max_body_bytes,
            job: Arc::clone(&handle),
            frontier: Arc::clone(handle.frontier()),
        });

        tokio::spawn(supervise(ctx, self.crawler.concurrency as usize));

        Ok(handle.snapshot())
    }

    /// Requests a stop of `spider`'s active job; returns whether one was stopped
    pub fn stop(&self, spider: &str) -> bool {
        let handle = self.jobs().get(spider).cloned();
        match handle {
            Some(handle) => handle.request_stop(),
            None => false,
        }
    }

    /// Requests a stop of every active job; returns how many were stopped
    pub fn stop_all(&self) -> usize {
        let handles: Vec<_> = self.jobs().values().cloned().collect();
        let stopped = handles.iter().filter(|h| h.request_stop()).count();
        tracing::info!("Stop requested for {} jobs", stopped);
        stopped
    }

    /// Latest job of every spider that has run, ordered by spider name
    pub fn list(&self) -> Vec<JobSnapshot> {
        self.jobs().values().map(|h| h.snapshot()).collect()
    }

    /// Latest job of one spider
    pub fn job(&self, spider: &str) -> Option<JobSnapshot> {
        self.jobs().get(spider).map(|h| h.snapshot())
    }

    /// Waits for `spider`'s latest job to finish
    pub async fn wait(&self, spider: &str) -> Option<JobSnapshot> {
        let handle = self.jobs().get(spider).cloned()?;
        Some(handle.wait().await)
    }

    pub fn has_active_jobs(&self) -> bool {
        self.jobs().values().any(|h| h.state().is_active())
    }
}

/// Runs a job's workers and settles its final state
async fn supervise(ctx: Arc<WorkerContext>, concurrency: usize) {
    let job = Arc::clone(&ctx.job);
    if !job.transition(JobState::Running) {
        // Stopped before it got going
        return;
    }

    let mut workers = JoinSet::new();
    for worker_id in 0..concurrency.max(1) {
        workers.spawn(run_worker(Arc::clone(&ctx), worker_id));
    }

    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            tracing::error!(job = %job.job_id(), "Worker task failed: {}", e);
        }
    }

    // Completed unless a stop was requested while the workers ran
    if !job.transition(JobState::Completed) {
        job.transition(JobState::Stopped);
    }

    let snapshot = job.snapshot();
    tracing::info!(
        job = %snapshot.job_id,
        "Spider {} {}: {} requested, {} scraped, {} dropped, {} errors in {}s",
        snapshot.spider,
        snapshot.state,
        snapshot.counters.requested,
        snapshot.counters.scraped,
        snapshot.counters.dropped,
        snapshot.counters.errors,
        snapshot.total_time().num_seconds()
    );
}
