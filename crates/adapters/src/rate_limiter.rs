// crates/adapters/src/rate_limiter.rs
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Token bucket rate limiter
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

struct TokenBucket {
    capacity: f64,
    available: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.available = (self.available + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

impl RateLimiter {
    pub fn new(capacity: usize, refill_per_sec: f64) -> Self {
        let capacity = capacity.max(1) as f64;
        Self {
            bucket: Mutex::new(TokenBucket {
                capacity,
                available: capacity,
                refill_rate: refill_per_sec.max(f64::MIN_POSITIVE),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Limiter allowing `per_minute` requests with a burst of the same size
    pub fn per_minute(per_minute: u32) -> Self {
        Self::new(per_minute as usize, per_minute as f64 / 60.0)
    }

    /// Take a token, sleeping until one is available
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                bucket.refill(Instant::now());
                if bucket.available >= 1.0 {
                    bucket.available -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.available) / bucket.refill_rate)
            };
            tracing::trace!("Rate limited, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }
}
