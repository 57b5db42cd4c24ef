//! Per-adapter circuit breaker: trips open after a run of failures, probes
//! half-open after a cooldown, and closes again after a run of successes.
//!
//! Grounded on `examples/Heyoub-caliber/caliber-api/src/providers/mod.rs`'s
//! `CircuitBreaker` (atomics for the hot path, a lock only around the
//! last-failure timestamp).

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use sark_domain::{CircuitState, Result as SarkResult, SarkError};

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Tracks health for a single adapter (or a single adapter/resource pair).
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failures: AtomicU32,
    successes: AtomicU32,
    last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: AtomicU8::new(CircuitState::Closed.into()),
            failures: AtomicU32::new(0),
            successes: AtomicU32::new(0),
            last_failure: RwLock::new(None),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Call before attempting an operation. Transitions Open -> HalfOpen
    /// once the cooldown has elapsed; otherwise rejects while open.
    pub fn before_call(&self) -> SarkResult<()> {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = self.last_failure.read().map(|t| t.elapsed());
                match elapsed {
                    Some(elapsed) if elapsed >= self.config.cooldown => {
                        self.state.store(CircuitState::HalfOpen.into(), Ordering::Release);
                        self.successes.store(0, Ordering::Release);
                        tracing::info!(adapter = %self.name, "circuit half-open, probing");
                        Ok(())
                    }
                    _ => {
                        let retry_after_secs = self
                            .last_failure
                            .read()
                            .map(|t| {
                                self.config
                                    .cooldown
                                    .saturating_sub(t.elapsed())
                                    .as_secs()
                            })
                            .unwrap_or(self.config.cooldown.as_secs());
                        Err(SarkError::CircuitOpen {
                            target: self.name.clone(),
                            retry_after_secs,
                        })
                    }
                }
            }
        }
    }

    pub fn record_success(&self) {
        match self.state() {
            CircuitState::HalfOpen => {
                let successes = self.successes.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.success_threshold {
                    self.state.store(CircuitState::Closed.into(), Ordering::Release);
                    self.failures.store(0, Ordering::Release);
                    tracing::info!(adapter = %self.name, "circuit closed");
                }
            }
            CircuitState::Closed => {
                self.failures.store(0, Ordering::Release);
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        *self.last_failure.write() = Some(Instant::now());
        match self.state() {
            CircuitState::HalfOpen => {
                self.trip();
            }
            CircuitState::Closed => {
                let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold {
                    self.trip();
                }
            }
            CircuitState::Open => {}
        }
    }

    fn trip(&self) {
        self.state.store(CircuitState::Open.into(), Ordering::Release);
        self.successes.store(0, Ordering::Release);
        tracing::warn!(adapter = %self.name, "circuit open");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 2,
            cooldown: Duration::from_millis(20),
        }
    }

    #[test]
    fn trips_after_threshold_failures() {
        let cb = CircuitBreaker::new("a", config());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.before_call().is_err());
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let cb = CircuitBreaker::new("a", config());
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.before_call().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new("a", config());
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        cb.before_call().unwrap();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
