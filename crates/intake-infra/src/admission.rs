//! Admission control
//!
//! A fixed budget of requests per rolling window, keyed by an opaque string
//! (`ip:{addr}` for HTTP callers). Each key keeps the timestamps of its admitted
//! requests inside the window, so the budget slides continuously instead of
//! resetting at window boundaries.
//!
//! The limiter is an owned value: the server creates one at setup and injects it
//! through application state. Nothing is global, and `reset` clears all counters.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const DEFAULT_SHARD_COUNT: usize = 16;
const DEFAULT_MAX_KEYS_PER_SHARD: usize = 10_000;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { remaining: u32 },
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

type Shard = Mutex<HashMap<String, VecDeque<Instant>>>;

/// Sharded rolling-window limiter.
///
/// Keys are hashed onto shards so unrelated callers rarely contend on one lock.
pub struct AdmissionControl {
    shards: Vec<Shard>,
    limit: u32,
    window: Duration,
    max_keys_per_shard: usize,
}

impl AdmissionControl {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_shards(limit, window, DEFAULT_SHARD_COUNT)
    }

    /// `shard_count` of zero is treated as one.
    pub fn with_shards(limit: u32, window: Duration, shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards,
            limit,
            window,
            max_keys_per_shard: DEFAULT_MAX_KEYS_PER_SHARD,
        }
    }

    /// Cap on tracked keys per shard; the least recently seen key is evicted beyond it.
    pub fn with_max_keys_per_shard(mut self, max_keys: usize) -> Self {
        self.max_keys_per_shard = max_keys.max(1);
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn shard_for(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Count a request against `key`, admitting it if the window still has budget.
    pub async fn check(&self, key: &str) -> Admission {
        let now = Instant::now();
        let mut entries = self.shard_for(key).lock().await;

        if !entries.contains_key(key) && entries.len() >= self.max_keys_per_shard {
            self.prune(&mut entries, now);
            if entries.len() >= self.max_keys_per_shard {
                let stalest = entries
                    .iter()
                    .min_by_key(|(_, hits)| hits.back().copied())
                    .map(|(k, _)| k.clone());
                if let Some(stalest) = stalest {
                    entries.remove(&stalest);
                    tracing::debug!(
                        evicted_key = %stalest,
                        "Evicted least recently seen admission key at capacity"
                    );
                }
            }
        }

        let hits = entries.entry(key.to_string()).or_default();
        while let Some(&oldest) = hits.front() {
            if now.duration_since(oldest) >= self.window {
                hits.pop_front();
            } else {
                break;
            }
        }

        if (hits.len() as u64) < u64::from(self.limit) {
            hits.push_back(now);
            Admission::Admitted {
                remaining: self.limit.saturating_sub(hits.len() as u32),
            }
        } else {
            // Budget frees up when the oldest admitted request leaves the window.
            let retry_after = hits
                .front()
                .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            Admission::Rejected { retry_after }
        }
    }

    fn prune(&self, entries: &mut HashMap<String, VecDeque<Instant>>, now: Instant) -> usize {
        let before = entries.len();
        let window = self.window;
        entries.retain(|_, hits| {
            hits.retain(|&t| now.duration_since(t) < window);
            !hits.is_empty()
        });
        before - entries.len()
    }

    /// Drop keys with no request inside the window. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut entries = shard.lock().await;
            removed += self.prune(&mut entries, now);
        }
        if removed > 0 {
            tracing::debug!(keys_removed = removed, "Cleaned up idle admission keys");
        }
        removed
    }

    /// Forget every counter.
    pub async fn reset(&self) {
        for shard in &self.shards {
            shard.lock().await.clear();
        }
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }
}
