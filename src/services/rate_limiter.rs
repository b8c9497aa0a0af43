//! Per-IP token buckets
//!
//! Each client IP owns a bucket holding up to `burst` tokens that refills at
//! `per_second`. A request spends one token or is refused. Buckets untouched
//! for `idle` are dropped by [`RateLimiter::sweep_idle`].

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::debug;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy)]
struct RateBucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

struct RateLimiterInner {
    per_second: f64,
    burst: f64,
    idle: Duration,
    buckets: DashMap<IpAddr, RateBucket>,
}

/// In-memory per-IP rate limiter, cheap to clone
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                per_second: config.per_second,
                burst: f64::from(config.burst.max(1)),
                idle: Duration::from_secs(config.idle_secs),
                buckets: DashMap::new(),
            }),
        }
    }

    /// Returns `true` if the request is allowed, `false` if rate-limited
    pub fn allow(&self, ip: IpAddr) -> bool {
        self.allow_at(ip, Instant::now())
    }

    pub(crate) fn allow_at(&self, ip: IpAddr, now: Instant) -> bool {
        let inner = &self.inner;
        // The entry guard locks only this bucket's shard
        let mut bucket = inner.buckets.entry(ip).or_insert(RateBucket {
            tokens: inner.burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * inner.per_second).min(inner.burst);
        bucket.last_refill = bucket.last_refill.max(now);
        bucket.last_seen = bucket.last_seen.max(now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops buckets idle for at least the configured idle window, returns how many went
    pub fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Instant::now())
    }

    pub(crate) fn sweep_idle_at(&self, now: Instant) -> usize {
        let idle = self.inner.idle;
        let before = self.inner.buckets.len();
        self.inner
            .buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < idle);
        before.saturating_sub(self.inner.buckets.len())
    }

    pub fn tracked(&self) -> usize {
        self.inner.buckets.len()
    }

    /// Sweeps idle buckets every `every` until the runtime shuts down
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = limiter.sweep_idle();
                if evicted > 0 {
                    debug!("Evicted {} idle rate limit buckets", evicted);
                }
            }
        })
    }
}
