//! Token-bucket rate limiter.

use tokio::time::Instant;

/// Bucket size and refill speed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateLimitPolicy {
    pub max_tokens: f64,
    pub refill_per_second: f64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_tokens: 100.0,
            refill_per_second: 10.0,
        }
    }
}

/// Token bucket that refills lazily on every check and on an external tick.
///
/// Both paths apply `tokens = min(max, tokens + elapsed_secs * rate)`, so a
/// tick followed by a check never double-counts elapsed time. The limiter is
/// not internally synchronized; the owning session keeps it behind its lock so
/// refill and consume form one critical section.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Full bucket, refill clock starting now.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::starting_at(policy, Instant::now())
    }

    pub fn starting_at(policy: RateLimitPolicy, now: Instant) -> Self {
        Self {
            policy,
            tokens: policy.max_tokens,
            last_refill: now,
        }
    }

    pub fn refill(&mut self) {
        self.refill_at(Instant::now());
    }

    pub fn refill_at(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.policy.refill_per_second)
            .min(self.policy.max_tokens)
            .max(0.0);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    pub fn try_consume(&mut self) -> bool {
        self.try_consume_at(Instant::now())
    }

    /// Refill, then take one token if at least one is available.
    pub fn try_consume_at(&mut self, now: Instant) -> bool {
        self.refill_at(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Whole tokens left, for display.
    pub fn remaining(&self) -> u32 {
        self.tokens.floor() as u32
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}
