//! In-process token bucket limiter.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::RateLimitConfig;
use crate::lifecycle::Shutdown;
use crate::security::rate_limit::RateLimiterError;

/// Per-key bucket state.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A fresh bucket already charged for the request that created it.
    fn charged(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: (capacity - 1.0).max(0.0),
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

type BucketMap = HashMap<String, TokenBucket>;
type Buckets = Arc<Mutex<BucketMap>>;

/// Bucket state stays consistent across a panic, so a poisoned lock is reused.
fn lock(buckets: &Mutex<BucketMap>) -> MutexGuard<'_, BucketMap> {
    buckets.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Token bucket limiter keyed by arbitrary strings.
///
/// Every key gets its own bucket with the same capacity and refill rate.
/// Lookup, creation and refill happen under one lock, so decisions for a
/// key are linearizable. A background sweeper removes buckets that have been
/// idle for longer than the TTL; it runs until the shutdown signal fires or
/// the limiter is dropped.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    buckets: Buckets,
    capacity: f64,
    refill_rate: f64,
    idle_ttl: Duration,
    sweeper: JoinHandle<()>,
}

impl TokenBucketLimiter {
    /// Create the limiter and start its idle sweeper.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: &RateLimitConfig, shutdown: &Shutdown) -> Self {
        let buckets: Buckets = Arc::new(Mutex::new(HashMap::new()));
        let idle_ttl = Duration::from_secs(config.idle_ttl_secs);
        let interval = Duration::from_secs(config.cleanup_interval_secs.max(1));

        let sweeper = tokio::spawn(run_sweeper(
            buckets.clone(),
            interval,
            idle_ttl,
            shutdown.signalled(),
        ));

        tracing::info!(
            capacity = config.burst,
            refill_per_sec = config.requests_per_second,
            sweep_interval_secs = interval.as_secs(),
            idle_ttl_secs = idle_ttl.as_secs(),
            "Local token bucket limiter started"
        );

        Self {
            buckets,
            capacity: config.burst as f64,
            refill_rate: config.requests_per_second as f64,
            idle_ttl,
            sweeper,
        }
    }

    /// Take one token for `key`.
    pub fn allow(&self, key: &str) -> Result<bool, RateLimiterError> {
        if key.is_empty() {
            return Err(RateLimiterError::EmptyKey);
        }

        let now = Instant::now();
        let mut buckets = lock(&self.buckets);

        match buckets.get_mut(key) {
            Some(bucket) => Ok(bucket.try_acquire(self.capacity, self.refill_rate, now)),
            None => {
                buckets.insert(key.to_string(), TokenBucket::charged(self.capacity, now));
                Ok(true)
            }
        }
    }

    /// Remove buckets idle for longer than the TTL. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        sweep_idle(&self.buckets, self.idle_ttl)
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        lock(&self.buckets).len()
    }

    /// Whether the background sweeper has exited.
    pub fn sweeper_stopped(&self) -> bool {
        self.sweeper.is_finished()
    }
}

impl Drop for TokenBucketLimiter {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

fn sweep_idle(buckets: &Mutex<BucketMap>, idle_ttl: Duration) -> usize {
    let now = Instant::now();
    let mut buckets = lock(buckets);
    let before = buckets.len();
    buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) <= idle_ttl);
    before - buckets.len()
}

async fn run_sweeper(
    buckets: Buckets,
    interval: Duration,
    idle_ttl: Duration,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);
    // The first tick of an interval fires immediately; skip it.
    let mut ticker = time::interval_at(Instant::now() + interval, interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = sweep_idle(&buckets, idle_ttl);
                if removed > 0 {
                    tracing::debug!(removed, "Swept idle rate limit buckets");
                }
            }
            _ = &mut shutdown => {
                tracing::debug!("Bucket sweeper received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
