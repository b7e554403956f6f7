//! Per-domain request gate
//!
//! Every fetch calls [`RateLimiter::wait`] with the target host before sending.
//! Callers for the same host are serialized and spaced at least
//! `min_interval` apart; callers for different hosts never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type Slot = Arc<tokio::sync::Mutex<Option<Instant>>>;

/// Minimum-interval gate keyed by domain
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    domains: Mutex<HashMap<String, Slot>>,
}

impl RateLimiter {
    /// Creates a limiter enforcing `min_interval` between requests to one domain
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to `domain` is allowed, then records the access
    ///
    /// The per-domain slot stays locked while sleeping, so concurrent callers
    /// for the same domain queue up behind each other.
    pub async fn wait(&self, domain: &str) {
        let slot = self.slot(domain);
        let mut last_access = slot.lock().await;

        if let Some(last) = *last_access {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                tracing::trace!("Rate limiting {} for {:?}", domain, remaining);
                tokio::time::sleep(remaining).await;
            }
        }

        *last_access = Some(Instant::now());
    }

    /// Number of domains seen so far
    pub fn tracked_domains(&self) -> usize {
        self.domains
            .lock()
            .map(|domains| domains.len())
            .unwrap_or_default()
    }

    fn slot(&self, domain: &str) -> Slot {
        let mut domains = self
            .domains
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(domains.entry(domain.to_string()).or_default())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}
