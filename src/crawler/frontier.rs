//! Per-job crawl frontier
//!
//! This module handles:
//! - FIFO queue of pending tasks (breadth-first order)
//! - Visited set keyed by normalized URL, so each URL is scheduled once
//! - In-flight accounting that tells a finished crawl from an idle moment
//! - Cancellation: a stopped frontier hands out no further work

use crate::crawler::job::UrlTask;
use crate::url::normalize_url;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<UrlTask>,
    visited: HashSet<String>,
    in_flight: usize,
    closed: bool,
}

/// Pending tasks and the set of URLs ever scheduled for one job
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<Inner>,
    changed: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never panic, so a poisoned lock still holds a
    // consistent queue.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues a task unless its URL was seen before or the frontier is closed
    ///
    /// The visited check and insert happen under one lock, so concurrent
    /// pushes of the same URL enqueue it exactly once.
    pub fn push(&self, task: UrlTask) -> bool {
        let key = match normalize_url(task.url.as_str()) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::debug!("Not scheduling {}: {}", task.url, e);
                return false;
            }
        };

        {
            let mut inner = self.lock();
            if inner.closed || !inner.visited.insert(key) {
                return false;
            }
            inner.queue.push_back(task);
        }

        self.changed.notify_waiters();
        true
    }

    /// Takes the next task, waiting while other tasks are in flight
    ///
    /// Returns `None` once the frontier is stopped, or drained: empty with
    /// nothing in flight that could add more work.
    pub async fn pop(self: &Arc<Self>) -> Option<Lease> {
        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            {
                let mut inner = self.lock();
                if inner.closed {
                    return None;
                }
                if let Some(task) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    return Some(Lease {
                        task,
                        frontier: Arc::clone(self),
                    });
                }
                if inner.in_flight == 0 {
                    return None;
                }
            }

            changed.await;
        }
    }

    /// No in-flight work, and nothing left to hand out
    pub fn is_drained(&self) -> bool {
        let inner = self.lock();
        inner.in_flight == 0 && (inner.queue.is_empty() || inner.closed)
    }

    /// Closes the frontier; waiting and future pops return `None`
    pub fn stop(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().closed
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Number of distinct URLs ever scheduled
    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    fn release(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }
}

/// A task checked out of the frontier
///
/// The task counts as in flight until the lease is completed or dropped.
#[derive(Debug)]
pub struct Lease {
    task: UrlTask,
    frontier: Arc<Frontier>,
}

impl Lease {
    pub fn task(&self) -> &UrlTask {
        &self.task
    }

    /// Marks the task finished
    pub fn complete(self) {}
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.frontier.release();
    }
}
