//! Distributed sliding window limiter backed by Redis sorted sets.
//!
//! Each key owns a sorted set of request markers scored by arrival time in
//! milliseconds. One call pipelines four commands in a single round trip:
//!
//! ```text
//! ZADD             {prefix}:{key} now member
//! ZREMRANGEBYSCORE {prefix}:{key} -inf window_start
//! ZCARD            {prefix}:{key}
//! PEXPIRE          {prefix}:{key} window + 1s
//! ```
//!
//! The pipeline is not wrapped in MULTI/EXEC. Concurrent callers on the same
//! key can interleave between the ZADD and the ZCARD, so the count is an
//! approximation under contention. Idle keys disappear through the expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use url::Url;

use crate::config::{RateLimitConfig, RedisConfig};
use crate::security::rate_limit::RateLimiterError;

const DEFAULT_LIMIT: u64 = 100;
const DEFAULT_WINDOW: Duration = Duration::from_secs(30);

/// Sliding window limiter shared by every gateway instance using the same store.
pub struct SlidingWindowLimiter {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    prefix: String,
    limit: u64,
    window: Duration,
    call_timeout: Duration,
    /// Disambiguates members created in the same millisecond.
    counter: AtomicU64,
}

impl SlidingWindowLimiter {
    /// Build a limiter without touching the network.
    ///
    /// A zero limit or window falls back to 100 requests per 30 seconds.
    pub fn new(
        client: redis::Client,
        prefix: impl Into<String>,
        limit: u64,
        window: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            conn: OnceCell::new(),
            prefix: prefix.into(),
            limit: if limit == 0 { DEFAULT_LIMIT } else { limit },
            window: if window.is_zero() { DEFAULT_WINDOW } else { window },
            call_timeout,
            counter: AtomicU64::new(0),
        }
    }

    /// Build a limiter from configuration and verify the store answers.
    pub async fn connect(
        redis: &RedisConfig,
        rate_limit: &RateLimitConfig,
    ) -> Result<Self, RateLimiterError> {
        let client = redis::Client::open(connection_url(redis)?.as_str())?;
        let limiter = Self::new(
            client,
            redis.key_prefix.clone(),
            rate_limit.requests_per_second as u64,
            Duration::from_millis(rate_limit.window_ms),
            redis.call_timeout(),
        );

        let timeout = redis.connect_timeout();
        tokio::time::timeout(timeout, limiter.ping())
            .await
            .map_err(|_| RateLimiterError::Timeout(timeout))??;

        tracing::info!(
            host = %redis.host,
            port = redis.port,
            limit = limiter.limit,
            window_ms = limiter.window.as_millis() as u64,
            "Distributed sliding window limiter connected"
        );
        Ok(limiter)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request for `key` and decide whether it fits in the window.
    pub async fn allow(&self, key: &str) -> Result<bool, RateLimiterError> {
        if key.is_empty() {
            return Err(RateLimiterError::EmptyKey);
        }

        tokio::time::timeout(self.call_timeout, self.record(key))
            .await
            .map_err(|_| RateLimiterError::Timeout(self.call_timeout))?
    }

    async fn record(&self, key: &str) -> Result<bool, RateLimiterError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let member = self.member(now);
        let pipeline = self.pipeline(key, &member, now.as_millis() as i64);

        let mut conn = self.connection().await?.clone();
        let (count,): (u64,) = pipeline.query_async(&mut conn).await?;

        Ok(self.admits(count))
    }

    /// Commands recording one request for `key` at `now_ms`; only ZCARD replies.
    fn pipeline(&self, key: &str, member: &str, now_ms: i64) -> redis::Pipeline {
        let redis_key = format!("{}:{}", self.prefix, key);
        let window_ms = self.window.as_millis() as i64;

        let mut pipe = redis::pipe();
        pipe.zadd(&redis_key, member, now_ms)
            .ignore()
            .zrembyscore(&redis_key, "-inf", now_ms - window_ms)
            .ignore()
            .zcard(&redis_key)
            .pexpire(&redis_key, window_ms + 1_000)
            .ignore();
        pipe
    }

    /// Unique sorted-set member for a request arriving at `now`.
    fn member(&self, now: Duration) -> String {
        format!(
            "{}:{}:{}",
            now.as_millis(),
            now.subsec_nanos() % 1_000_000,
            self.counter.fetch_add(1, Ordering::Relaxed) + 1
        )
    }

    /// Whether a window holding `count` requests, this one included, admits it.
    fn admits(&self, count: u64) -> bool {
        count <= self.limit
    }

    async fn ping(&self) -> Result<(), RateLimiterError> {
        let mut conn = self.connection().await?.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Lazily established, auto-reconnecting connection.
    async fn connection(&self) -> Result<&ConnectionManager, RateLimiterError> {
        self.conn
            .get_or_try_init(|| async {
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(RateLimiterError::from)
            })
            .await
    }
}

impl std::fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("prefix", &self.prefix)
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("call_timeout", &self.call_timeout)
            .field("connected", &self.conn.initialized())
            .finish()
    }
}

/// `redis://[:password@]host:port/db`, with the password percent-encoded.
fn connection_url(config: &RedisConfig) -> Result<Url, RateLimiterError> {
    let mut url = Url::parse(&format!(
        "redis://{}:{}/{}",
        config.host.trim(),
        config.port,
        config.db
    ))
    .map_err(|e| RateLimiterError::Config(e.to_string()))?;

    if !config.password.is_empty() {
        url.set_password(Some(&config.password))
            .map_err(|_| RateLimiterError::Config("cannot attach password to redis url".into()))?;
    }
    Ok(url)
}
