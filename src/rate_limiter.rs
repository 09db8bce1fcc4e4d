//! Per-identifier token bucket rate limiting for pipeline entry points.
//!
//! This module provides the [`RateLimiter`] struct which hands out permits from
//! a token bucket kept per caller identifier. Buckets refill continuously at a
//! fixed rate and are capped at a fixed capacity.
//!
//! # Overview
//!
//! A bucket is created lazily (full) the first time an identifier is seen, so
//! the first request from any caller always succeeds. The bucket map is bounded:
//! a new identifier that pushes the map past `max_buckets` evicts the ones that
//! were touched least recently.
//!
//! # Example
//!
//! ```
//! use spec_fetch_core::rate_limiter::RateLimiter;
//!
//! let limiter = RateLimiter::default();
//!
//! // Ten requests fit in a fresh bucket...
//! for _ in 0..10 {
//!     assert!(limiter.allow("203.0.113.7", 1));
//! }
//!
//! // ...the eleventh is refused until the bucket refills.
//! assert!(!limiter.allow("203.0.113.7", 1));
//! ```

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Default number of permits a bucket holds.
pub const DEFAULT_CAPACITY: u32 = 10;

/// Default time it takes to regain one permit (one token per minute).
pub const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(60);

/// Default upper bound on tracked identifiers.
pub const DEFAULT_MAX_BUCKETS: usize = 10_000;

/// Identifier shared by every caller that did not report one.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// Token bucket rate limiter keyed by caller identifier.
///
/// `RateLimiter` is `Send + Sync` and is meant to be shared behind an `Arc`.
/// Every check is a read-modify-write performed while holding the `DashMap`
/// shard lock for that identifier, so concurrent checks against the same
/// bucket never lose updates.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum permits per bucket.
    capacity: u32,

    /// Permits regained per elapsed millisecond.
    refill_per_ms: f64,

    /// Maximum number of identifiers tracked at once.
    max_buckets: usize,

    /// Whether rate limiting is disabled.
    disabled: bool,

    buckets: DashMap<String, RateBucket>,
}

/// State tracked for each identifier.
#[derive(Debug, Clone, Copy)]
struct RateBucket {
    /// Invariant: `0.0 <= tokens <= capacity`.
    tokens: f64,
    /// Last time the bucket was checked. Updated on every check, even when no
    /// whole token was added.
    last_refill: Instant,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_REFILL_INTERVAL)
    }
}

impl RateLimiter {
    /// Creates a limiter whose buckets hold `capacity` permits and regain one
    /// permit every `refill_interval`.
    ///
    /// A zero `refill_interval` is treated as one millisecond.
    #[must_use]
    #[instrument(skip_all, fields(capacity, refill_ms = refill_interval.as_millis()))]
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        debug!("creating rate limiter");
        #[allow(clippy::cast_precision_loss)]
        let interval_ms = refill_interval.as_millis().max(1) as f64;
        Self {
            capacity,
            refill_per_ms: 1.0 / interval_ms,
            max_buckets: DEFAULT_MAX_BUCKETS,
            disabled: false,
            buckets: DashMap::new(),
        }
    }

    /// Creates a disabled rate limiter that allows every request.
    #[must_use]
    pub fn disabled() -> Self {
        debug!("creating disabled rate limiter");
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Sets the maximum number of tracked identifiers (at least one).
    #[must_use]
    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets.max(1);
        self
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the bucket capacity.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the number of identifiers currently tracked.
    #[must_use]
    pub fn tracked_identifiers(&self) -> usize {
        self.buckets.len()
    }

    /// Takes `cost` permits from the bucket for `identifier` if available.
    ///
    /// Returns `true` when the request may proceed.
    #[instrument(skip(self))]
    pub fn allow(&self, identifier: &str, cost: u32) -> bool {
        self.allow_at(identifier, cost, Instant::now())
    }

    fn allow_at(&self, identifier: &str, cost: u32, now: Instant) -> bool {
        if self.disabled {
            return true;
        }

        let capacity = f64::from(self.capacity);
        let mut inserted = false;
        let allowed = {
            let mut bucket = self
                .buckets
                .entry(identifier.to_string())
                .or_insert_with(|| {
                    inserted = true;
                    RateBucket {
                        tokens: capacity,
                        last_refill: now,
                    }
                });

            #[allow(clippy::cast_precision_loss)]
            let elapsed_ms = now.saturating_duration_since(bucket.last_refill).as_millis() as f64;
            let refill = (elapsed_ms * self.refill_per_ms).floor();
            bucket.tokens = (bucket.tokens + refill).min(capacity);
            bucket.last_refill = now;

            let cost = f64::from(cost);
            if bucket.tokens >= cost {
                bucket.tokens -= cost;
                true
            } else {
                warn!(identifier, tokens = bucket.tokens, "rate limit exceeded");
                false
            }
        };

        // The entry guard must be released before scanning other shards.
        if inserted {
            self.trim_to_bound(identifier);
        }
        allowed
    }

    /// Drops least recently checked buckets, never `keep`, until the map is
    /// back within `max_buckets`.
    ///
    /// Called after the insert; concurrent inserters each trim their own
    /// overflow. Each pass scans every bucket, so it only runs for a new
    /// identifier arriving at a full map.
    fn trim_to_bound(&self, keep: &str) {
        while self.buckets.len() > self.max_buckets {
            let oldest = self
                .buckets
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.value().last_refill)
                .map(|entry| entry.key().clone());

            let Some(key) = oldest else {
                break;
            };
            debug!(identifier = %key, "evicting least recently used rate bucket");
            self.buckets.remove(&key);
        }
    }
}
