//! Decision Cache — caches Policy Engine outcomes keyed on everything
//! policy-salient about a request *except* argument values, so that
//! repeated calls to the same capability under the same conditions skip
//! re-evaluation entirely.
//!
//! Grounded on the teacher's `QuotaTracker` (`parking_lot::RwLock` over a
//! `HashMap`, read-mostly access pattern) generalized from daily usage
//! counters to TTL'd decision entries.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use sark_domain::{Decision, InvocationRequest};

/// Derive the cache key for a request. Never includes `request.arguments` —
/// only the action taxonomy and the policy-salient subset of `context`.
pub fn cache_key(action: &str, request: &InvocationRequest) -> String {
    let context_salt = request
        .context
        .get("policy_context_hash")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    format!(
        "{}:{}:{}:{}:{}",
        request.principal.identifier(),
        action,
        request.resource_id,
        request.capability_id,
        context_salt,
    )
}

struct Entry {
    decision: Decision,
    expires_at: Instant,
}

/// Metrics from a single sweep pass, matching the teacher's `snapshot()`
/// style plain-serializable metric structs.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SweepMetrics {
    pub cleanups_run: u64,
    pub entries_removed: u64,
    pub duration_ms: u64,
    pub errors: u64,
}

/// In-memory Decision Cache. Backend failure (none here — this is the
/// in-process implementation) degrades to a miss; it can never fail
/// authorization.
pub struct DecisionCache {
    entries: RwLock<HashMap<String, Entry>>,
    max_entries: usize,
    metrics: RwLock<SweepMetrics>,
}

impl DecisionCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
            metrics: RwLock::new(SweepMetrics::default()),
        }
    }

    /// Look up a cached decision. Expired entries are treated as a miss
    /// (removed lazily on next sweep, not on read, to keep reads lock-cheap).
    pub fn get(&self, key: &str) -> Option<Decision> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(e) if e.expires_at > Instant::now() => Some(e.decision.clone()),
            _ => None,
        }
    }

    /// Insert a decision with the given TTL. `ttl.is_zero()` is a no-op —
    /// critical-sensitivity decisions are never cached.
    pub fn put(&self, key: String, decision: Decision, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            tracing::warn!(max_entries = self.max_entries, "decision cache at capacity, dropping insert");
            return;
        }
        entries.insert(
            key,
            Entry { decision, expires_at: Instant::now() + ttl },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Remove all expired entries. Intended to run on a periodic
    /// background task (default interval 60s); never blocks a request path.
    pub fn cleanup_expired(&self) -> SweepMetrics {
        let start = Instant::now();
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let removed = (before - entries.len()) as u64;
        drop(entries);

        let mut metrics = self.metrics.write();
        metrics.cleanups_run += 1;
        metrics.entries_removed += removed;
        metrics.duration_ms = start.elapsed().as_millis() as u64;
        metrics.clone()
    }

    pub fn metrics_snapshot(&self) -> SweepMetrics {
        self.metrics.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sark_domain::{Principal, PrincipalKind};

    fn sample_request() -> InvocationRequest {
        InvocationRequest {
            request_id: "r1".into(),
            principal: Principal::new("abc", PrincipalKind::ApiKey),
            resource_id: "res1".into(),
            capability_id: "cap1".into(),
            arguments: serde_json::json!({"secret": "should-not-affect-key"}),
            context: serde_json::json!({}),
        }
    }

    fn sample_decision() -> Decision {
        Decision {
            allow: true,
            reason: "ok".into(),
            filtered_parameters: Vec::new(),
            cache_ttl_secs: 300,
            policy_version: None,
        }
    }

    #[test]
    fn put_then_get_returns_decision() {
        let cache = DecisionCache::new(10);
        let key = cache_key("invoke", &sample_request());
        cache.put(key.clone(), sample_decision(), Duration::from_secs(60));
        let got = cache.get(&key).expect("present");
        assert!(got.allow);
    }

    #[test]
    fn zero_ttl_is_never_cached() {
        let cache = DecisionCache::new(10);
        let key = cache_key("invoke", &sample_request());
        cache.put(key.clone(), sample_decision(), Duration::ZERO);
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = DecisionCache::new(10);
        let key = cache_key("invoke", &sample_request());
        cache.put(key.clone(), sample_decision(), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn cache_key_ignores_arguments() {
        let mut req_a = sample_request();
        let mut req_b = sample_request();
        req_a.arguments = serde_json::json!({"x": 1});
        req_b.arguments = serde_json::json!({"x": 2, "y": "different"});
        assert_eq!(cache_key("invoke", &req_a), cache_key("invoke", &req_b));
    }

    #[test]
    fn cleanup_expired_removes_only_expired_entries() {
        let cache = DecisionCache::new(10);
        cache.put("stale".into(), sample_decision(), Duration::from_millis(1));
        cache.put("fresh".into(), sample_decision(), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));
        let metrics = cache.cleanup_expired();
        assert_eq!(metrics.entries_removed, 1);
        assert!(cache.get("fresh").is_some());
    }
}
