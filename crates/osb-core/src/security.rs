use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::domain::UserId;

// ============== Authorization ==============

/// An empty allowlist means the bot is open to everyone.
pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    allowed_users.is_empty() || allowed_users.contains(&user_id.0)
}

// ============== Search Rate Limiter (Token Bucket) ==============

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

#[derive(Clone, Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Per-user token bucket. Every search spends one token; a full bucket holds
/// `burst` tokens and refills completely over `window`.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    enabled: bool,
    burst: f64,
    per_sec: f64,
    buckets: HashMap<UserId, Bucket>,
}

impl RateLimiter {
    pub fn new(enabled: bool, burst: u32, window: Duration) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            enabled,
            burst,
            per_sec: burst / window.as_secs_f64().max(1e-9),
            buckets: HashMap::new(),
        }
    }

    pub fn check(&mut self, user_id: UserId) -> RateDecision {
        self.check_at(user_id, Instant::now())
    }

    pub fn check_at(&mut self, user_id: UserId, now: Instant) -> RateDecision {
        if !self.enabled {
            return RateDecision::Allowed;
        }

        let burst = self.burst;
        let bucket = self.buckets.entry(user_id).or_insert(Bucket {
            tokens: burst,
            refilled_at: now,
        });

        let elapsed = now.saturating_duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_sec).min(burst);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return RateDecision::Allowed;
        }

        let secs = (1.0 - bucket.tokens) / self.per_sec;
        RateDecision::Limited {
            retry_after: Duration::from_secs_f64(secs.max(0.0)),
        }
    }

    /// Forget buckets that have refilled completely; they behave like new ones.
    /// Returns how many were dropped.
    pub fn prune_at(&mut self, now: Instant) -> usize {
        let (burst, per_sec) = (self.burst, self.per_sec);
        let before = self.buckets.len();
        self.buckets.retain(|_, b| {
            let elapsed = now.saturating_duration_since(b.refilled_at).as_secs_f64();
            b.tokens + elapsed * per_sec < burst
        });
        before - self.buckets.len()
    }

    pub fn tracked_users(&self) -> usize {
        self.buckets.len()
    }
}
