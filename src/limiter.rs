//! Sliding-window rate limiter.
//!
//! An explicit component instance: callers construct one and thread it
//! through by reference, so independent crawl contexts can share or isolate
//! limits by composition. There is no process-global state here.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Counts requests per key over a rolling window.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` when `key` is still under its budget. Expired entries
    /// are pruned as a side effect.
    pub fn can_request(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.lock();
        let timestamps = requests.entry(key.to_string()).or_default();
        timestamps.retain(|&stamp| now.duration_since(stamp) < self.window);
        timestamps.len() < self.max_requests
    }

    /// Records one request for `key`.
    pub fn record_request(&self, key: &str) {
        let mut requests = self.requests.lock();
        requests.entry(key.to_string()).or_default().push(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }
}
