//! Rate Limiter — in-process sliding-window admission control keyed by
//! principal identifier (API key > principal > token hash > client IP
//! precedence is the caller's responsibility to resolve before calling
//! [`RateLimiter::check`]).
//!
//! Algorithm grounded on
//! `examples/original_source/src/sark/services/rate_limiter.py`'s
//! Redis sorted-set sliding window (evict timestamps older than the
//! window, count, admit if under limit, append), reimplemented over a
//! `parking_lot::RwLock<HashMap<_, VecDeque<Instant>>>` the way the
//! teacher's `QuotaTracker` holds per-key state.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use sark_domain::config::RateLimitConfig;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_after_secs: u64,
    pub retry_after_secs: Option<u64>,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: RwLock<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, buckets: RwLock::new(HashMap::new()) }
    }

    fn limit_for(&self, identifier: &str) -> u64 {
        self.config
            .overrides
            .get(identifier)
            .copied()
            .unwrap_or(self.config.default_limit)
    }

    /// Check and record a request against `identifier`'s sliding window.
    /// Admin-bypass identifiers always admit without recording.
    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        if self.config.admin_bypass.iter().any(|b| b == identifier) {
            return RateLimitDecision {
                allowed: true,
                limit: u64::MAX,
                remaining: u64::MAX,
                reset_after_secs: 0,
                retry_after_secs: None,
            };
        }

        let limit = self.limit_for(identifier);
        let window = Duration::from_secs(self.config.window_secs);
        let now = Instant::now();

        let mut buckets = self.buckets.write();
        let entry = buckets.entry(identifier.to_string()).or_default();
        while let Some(&oldest) = entry.front() {
            if now.duration_since(oldest) > window {
                entry.pop_front();
            } else {
                break;
            }
        }

        let count = entry.len() as u64;
        let allowed = count < limit;
        if allowed {
            entry.push_back(now);
        }
        let remaining = limit.saturating_sub(count + if allowed { 1 } else { 0 });

        let retry_after_secs = if allowed {
            None
        } else {
            entry.front().map(|&oldest| {
                let elapsed = now.duration_since(oldest);
                window.saturating_sub(elapsed).as_secs().max(1)
            })
        };

        RateLimitDecision {
            allowed,
            limit,
            remaining,
            reset_after_secs: self.config.window_secs,
            retry_after_secs,
        }
    }

    pub fn reset(&self, identifier: &str) {
        self.buckets.write().remove(identifier);
    }

    pub fn current_usage(&self, identifier: &str) -> u64 {
        self.buckets
            .read()
            .get(identifier)
            .map(|q| q.len() as u64)
            .unwrap_or(0)
    }
}

/// Build the standard `X-RateLimit-*` / `Retry-After` response headers for
/// a decision.
pub fn response_headers(decision: &RateLimitDecision) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("X-RateLimit-Limit", decision.limit.to_string()),
        ("X-RateLimit-Remaining", decision.remaining.to_string()),
        ("X-RateLimit-Reset", decision.reset_after_secs.to_string()),
    ];
    if let Some(retry_after) = decision.retry_after_secs {
        headers.push(("Retry-After", retry_after.to_string()));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(limit: u64, window_secs: u64) -> RateLimitConfig {
        RateLimitConfig {
            default_limit: limit,
            window_secs,
            overrides: HashMap::new(),
            admin_bypass: Vec::new(),
        }
    }

    #[test]
    fn admits_under_limit() {
        let limiter = RateLimiter::new(cfg(5, 60));
        for _ in 0..5 {
            assert!(limiter.check("api_key:abc").allowed);
        }
    }

    #[test]
    fn rejects_over_limit_with_retry_after() {
        let limiter = RateLimiter::new(cfg(2, 60));
        assert!(limiter.check("api_key:abc").allowed);
        assert!(limiter.check("api_key:abc").allowed);
        let decision = limiter.check("api_key:abc");
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after_secs.unwrap() >= 1);
    }

    #[test]
    fn admin_bypass_never_counted() {
        let mut config = cfg(1, 60);
        config.admin_bypass.push("service:internal".into());
        let limiter = RateLimiter::new(config);
        for _ in 0..10 {
            assert!(limiter.check("service:internal").allowed);
        }
    }

    #[test]
    fn per_identifier_override_takes_precedence() {
        let mut config = cfg(1, 60);
        config.overrides.insert("api_key:vip".into(), 100);
        let limiter = RateLimiter::new(config);
        for _ in 0..50 {
            assert!(limiter.check("api_key:vip").allowed);
        }
    }

    #[test]
    fn reset_clears_the_window() {
        let limiter = RateLimiter::new(cfg(1, 60));
        assert!(limiter.check("api_key:abc").allowed);
        assert!(!limiter.check("api_key:abc").allowed);
        limiter.reset("api_key:abc");
        assert!(limiter.check("api_key:abc").allowed);
    }
}
