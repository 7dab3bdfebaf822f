//! Per-host request spacing
//!
//! Each request reserves the host's next free slot before it sleeps, so
//! concurrent workers hitting one host queue up behind each other instead of
//! all waking at once.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Minimum gap between two requests to the same host
#[derive(Debug)]
pub struct Politeness {
    delay: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl Politeness {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Reserves a slot for `url`'s host and returns how long to wait for it
    pub fn reserve(&self, url: &Url) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }
        let Some(host) = crate::url::host_of(url) else {
            return Duration::ZERO;
        };

        let now = Instant::now();
        let mut slots = self.next_slot.lock().unwrap_or_else(PoisonError::into_inner);
        // Hosts whose next slot has passed would not delay anyone
        slots.retain(|_, slot| *slot > now);
        let slot = slots.get(&host).copied().unwrap_or(now);
        slots.insert(host, slot + self.delay);

        slot - now
    }

    /// Waits until `url`'s host may be requested again
    pub async fn wait(&self, url: &Url) {
        let wait = self.reserve(url);
        if !wait.is_zero() {
            tracing::debug!(
                host = url.host_str().unwrap_or(""),
                wait_ms = wait.as_millis() as u64,
                "Throttling request"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
