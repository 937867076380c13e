//! Rate limiting utilities

use std::time::{Duration, Instant};

/// Simple token-bucket rate limiter for outgoing backend requests
///
/// The bucket starts full and is topped back up to `max_tokens` once per
/// elapsed `refill_interval`.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum tokens (requests) per interval
    max_tokens: u32,
    /// How often tokens are replenished
    refill_interval: Duration,
    tokens: u32,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests allowed per interval
    /// * `interval` - Time interval for the limit
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self::starting_at(max_requests, interval, Instant::now())
    }

    fn starting_at(max_requests: u32, interval: Duration, now: Instant) -> Self {
        Self {
            max_tokens: max_requests,
            refill_interval: interval,
            tokens: max_requests,
            last_refill: now,
        }
    }

    /// Check if a request should be allowed now
    ///
    /// Returns `true` and consumes a token if allowed, `false` if rate limited
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    fn check_at(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// How long until the next token becomes available (zero if one is
    /// available right now)
    pub fn time_until_available(&self) -> Duration {
        self.time_until_available_at(Instant::now())
    }

    fn time_until_available_at(&self, now: Instant) -> Duration {
        if self.tokens > 0 {
            return Duration::ZERO;
        }
        let elapsed = now.duration_since(self.last_refill);
        self.refill_interval.saturating_sub(elapsed)
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill);
        if elapsed >= self.refill_interval {
            let intervals = if self.refill_interval.is_zero() {
                1
            } else {
                (elapsed.as_millis() / self.refill_interval.as_millis().max(1)) as u32
            };
            self.tokens = self
                .tokens
                .saturating_add(intervals.saturating_mul(self.max_tokens))
                .min(self.max_tokens);
            self.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_within_limit() {
        let start = Instant::now();
        let mut limiter = RateLimiter::starting_at(5, Duration::from_secs(1), start);

        for _ in 0..5 {
            assert!(limiter.check_at(start));
        }

        // 6th request should be denied
        assert!(!limiter.check_at(start));
    }

    #[test]
    fn test_rate_limiter_refills_after_interval() {
        let start = Instant::now();
        let mut limiter = RateLimiter::starting_at(2, Duration::from_secs(1), start);

        assert!(limiter.check_at(start));
        assert!(limiter.check_at(start));
        assert!(!limiter.check_at(start));

        let later = start + Duration::from_millis(1100);
        assert!(limiter.check_at(later));
        assert!(limiter.check_at(later));
        assert!(!limiter.check_at(later));
    }

    #[test]
    fn test_time_until_available() {
        let start = Instant::now();
        let mut limiter = RateLimiter::starting_at(1, Duration::from_secs(2), start);

        assert_eq!(limiter.time_until_available_at(start), Duration::ZERO);
        assert!(limiter.check_at(start));

        let wait = limiter.time_until_available_at(start + Duration::from_millis(500));
        assert_eq!(wait, Duration::from_millis(1500));
    }
}
