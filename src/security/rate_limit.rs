//! Per-client token bucket rate limiting.
//!
//! # Design Decisions
//! - One bucket per client IP, created lazily on first sight
//! - Refill of `limit` tokens per minute, burst of `limit / 10` (at least 1)
//! - Integer token accounting: exactly one token per `60s / limit`
//! - Map shards only guard membership; each bucket has its own mutex, so
//!   different clients never wait on each other's accounting

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::observability::metrics;

const MINUTE: Duration = Duration::from_secs(60);

/// A token bucket with integral tokens.
#[derive(Debug)]
struct TokenBucket {
    capacity: u32,
    tokens: u32,
    period: Duration,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    fn new(limit: u32, now: Instant) -> Self {
        let capacity = (limit / 10).max(1);
        Self {
            capacity,
            tokens: capacity,
            period: MINUTE / limit,
            last_refill: now,
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        self.last_seen = self.last_seen.max(now);

        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = elapsed.as_nanos() / self.period.as_nanos().max(1);
        if earned > 0 {
            let room = u128::from(self.capacity - self.tokens);
            if earned >= room {
                self.tokens = self.capacity;
                self.last_refill = now;
            } else {
                // earned < room <= u32::MAX
                self.tokens += earned as u32;
                self.last_refill += self.period * earned as u32;
            }
        }

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Time after which an untouched bucket is full again.
    fn time_to_full(&self) -> Duration {
        self.period * self.capacity
    }
}

/// Registry of per-client rate limiters.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    buckets: DashMap<String, Arc<Mutex<TokenBucket>>>,
    exempt: HashSet<String>,
}

impl RateLimiterRegistry {
    /// Create a registry; clients in `exempt` are never limited.
    pub fn new(exempt: HashSet<String>) -> Self {
        Self {
            buckets: DashMap::new(),
            exempt,
        }
    }

    /// Try to consume one token for `ip`.
    ///
    /// Returns `(allowed, bucket_created)`. A `limit` of zero disables limiting.
    pub fn allow(&self, ip: &str, limit: u32) -> (bool, bool) {
        self.allow_at(ip, limit, Instant::now())
    }

    pub(crate) fn allow_at(&self, ip: &str, limit: u32, now: Instant) -> (bool, bool) {
        if limit == 0 || self.is_exempt(ip) {
            return (true, false);
        }

        let (bucket, created) = self.bucket_for(ip, limit, now);
        let allowed = bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire(now);

        if created {
            metrics::record_bucket_count(self.buckets.len());
        }
        (allowed, created)
    }

    fn bucket_for(&self, ip: &str, limit: u32, now: Instant) -> (Arc<Mutex<TokenBucket>>, bool) {
        if let Some(existing) = self.buckets.get(ip) {
            return (Arc::clone(existing.value()), false);
        }

        // Another caller may have inserted between the read above and here;
        // the entry API settles who creates it.
        match self.buckets.entry(ip.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let bucket = Arc::new(Mutex::new(TokenBucket::new(limit, now)));
                entry.insert(Arc::clone(&bucket));
                (bucket, true)
            }
        }
    }

    /// Drop buckets idle for at least `idle_ttl` that have also refilled completely.
    ///
    /// A bucket some caller still holds is kept, so a token taken from it is
    /// never lost. Returns how many buckets were removed.
    pub fn evict_idle(&self, idle_ttl: Duration) -> usize {
        self.evict_idle_at(idle_ttl, Instant::now())
    }

    pub(crate) fn evict_idle_at(&self, idle_ttl: Duration, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            // The map's own reference is the only one.
            if Arc::strong_count(bucket) > 1 {
                return true;
            }
            let bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
            let idle = now.saturating_duration_since(bucket.last_seen);
            idle < idle_ttl.max(bucket.time_to_full())
        });
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            metrics::record_bucket_count(self.buckets.len());
        }
        removed
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn is_exempt(&self, ip: &str) -> bool {
        self.exempt.contains(ip)
    }
}
