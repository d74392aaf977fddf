use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::RateLimiterConfig;

/// Decides how long a key must wait before it is re-delivered.
pub trait RateLimiter<K>: Send + Sync {
    /// Delay before `key` may be processed again. Records a failure for per-key limiters.
    fn when(
        &self,
        key: &K,
    ) -> Duration;

    /// Failures recorded for `key` since the last `forget`
    fn num_requeues(
        &self,
        key: &K,
    ) -> u32;

    /// Drop all failure history of `key`
    fn forget(
        &self,
        key: &K,
    );
}

/// Per-key exponential backoff: `base * 2^failures`, capped at `max`.
pub struct ExponentialFailureRateLimiter<K> {
    base_delay: Duration,
    max_delay: Duration,
    failures: Mutex<HashMap<K, u32>>,
}

impl<K> ExponentialFailureRateLimiter<K>
where K: Eq + Hash
{
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            base_delay,
            max_delay,
            failures: Mutex::new(HashMap::new()),
        }
    }

    fn backoff(
        &self,
        exp: u32,
    ) -> Duration {
        // 2^exp overflows u32 long before the cap stops mattering
        let factor = 2u32.checked_pow(exp).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map(|d| d.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }
}

impl<K> RateLimiter<K> for ExponentialFailureRateLimiter<K>
where K: Eq + Hash + Clone + Send + Sync
{
    fn when(
        &self,
        key: &K,
    ) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.entry(key.clone()).or_insert(0);
        let exp = *count;
        *count = count.saturating_add(1);
        self.backoff(exp)
    }

    fn num_requeues(
        &self,
        key: &K,
    ) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }

    fn forget(
        &self,
        key: &K,
    ) {
        self.failures.lock().remove(key);
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Lowest refill rate a token bucket accepts; zero, negative and NaN rates are raised to it.
pub const MIN_QPS: f64 = 0.001;

/// Overall token bucket shared by every key: `qps` sustained, `burst` at once.
///
/// Each call to `when` reserves one token, possibly in the future.
pub struct TokenBucketRateLimiter {
    qps: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl TokenBucketRateLimiter {
    pub fn new(
        qps: f64,
        burst: u32,
    ) -> Self {
        let burst = f64::from(burst.max(1));
        let qps = if qps > MIN_QPS { qps } else { MIN_QPS };
        Self {
            qps,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }

    fn reserve(&self) -> Duration {
        let mut bucket = self.bucket.lock();
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.qps).min(self.burst);
        bucket.last = now;

        bucket.tokens -= 1.0;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.qps)
        }
    }
}

impl<K> RateLimiter<K> for TokenBucketRateLimiter {
    fn when(
        &self,
        _key: &K,
    ) -> Duration {
        self.reserve()
    }

    fn num_requeues(
        &self,
        _key: &K,
    ) -> u32 {
        0
    }

    fn forget(
        &self,
        _key: &K,
    ) {
    }
}

/// Combines limiters: the longest delay wins, the highest requeue count wins.
pub struct MaxOfRateLimiter<K> {
    limiters: Vec<Box<dyn RateLimiter<K>>>,
}

impl<K> MaxOfRateLimiter<K> {
    pub fn new(limiters: Vec<Box<dyn RateLimiter<K>>>) -> Self {
        Self { limiters }
    }
}

impl<K> RateLimiter<K> for MaxOfRateLimiter<K>
where K: Send + Sync
{
    fn when(
        &self,
        key: &K,
    ) -> Duration {
        self.limiters.iter().map(|l| l.when(key)).max().unwrap_or(Duration::ZERO)
    }

    fn num_requeues(
        &self,
        key: &K,
    ) -> u32 {
        self.limiters.iter().map(|l| l.num_requeues(key)).max().unwrap_or(0)
    }

    fn forget(
        &self,
        key: &K,
    ) {
        for limiter in &self.limiters {
            limiter.forget(key);
        }
    }
}

/// Per-key exponential backoff combined with an overall token bucket.
pub fn default_controller_rate_limiter<K>(config: &RateLimiterConfig) -> MaxOfRateLimiter<K>
where K: Eq + Hash + Clone + Debug + Send + Sync + 'static {
    MaxOfRateLimiter::new(vec![
        Box::new(ExponentialFailureRateLimiter::new(
            config.base_delay(),
            config.max_delay(),
        )),
        Box::new(TokenBucketRateLimiter::new(config.qps, config.burst)),
    ])
}
