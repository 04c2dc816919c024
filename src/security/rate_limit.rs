//! Local (per data-plane instance) rate limiting.
//!
//! Each route with an effective rate-limit policy gets its own token bucket:
//! capacity `requests`, refilled at `requests / unit` tokens per second. The
//! state is never shared across instances.

use std::collections::BTreeSet;
use std::time::Instant;

use dashmap::DashMap;

use crate::model::RateLimitPolicy;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Buckets keyed by route id and policy.
#[derive(Debug, Default)]
pub struct LocalRateLimiter {
    buckets: DashMap<(String, RateLimitPolicy), TokenBucket>,
}

impl LocalRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one token for `route_id`. Returns false when the limit is exceeded.
    pub fn check(&self, route_id: &str, policy: &RateLimitPolicy) -> bool {
        self.check_at(route_id, policy, Instant::now())
    }

    fn check_at(&self, route_id: &str, policy: &RateLimitPolicy, now: Instant) -> bool {
        let capacity = policy.requests as f64;
        let refill_rate = capacity / policy.unit.as_secs() as f64;

        let mut bucket = self
            .buckets
            .entry((route_id.to_string(), *policy))
            .or_insert_with(|| TokenBucket::new(capacity, now));
        bucket.try_acquire(capacity, refill_rate, now)
    }

    /// Drop buckets for routes no longer present in the published tables.
    pub fn retain_routes(&self, live: &BTreeSet<String>) {
        self.buckets.retain(|(id, _), _| live.contains(id));
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
