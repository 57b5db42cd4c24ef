use std::sync::Arc;

use sark_adapters::AdapterRegistry;
use sark_audit::{AuditRecorder, SiemQueue};
use sark_cache::DecisionCache;
use sark_cost::{BudgetController, CostEstimator};
use sark_domain::config::Config;
use sark_domain::Principal;
use sark_policy::PolicyEngine;
use sark_ratelimit::RateLimiter;

/// Shared application state passed to every API handler. Grouped by
/// concern, mirroring the four governance components: policy decisions,
/// protocol adapters, cost/budget, and audit.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── Policy Decision Engine ───────────────────────────────────────
    pub decision_cache: Arc<DecisionCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub policy_engine: Arc<PolicyEngine>,

    // ── Protocol Adapter Layer ────────────────────────────────────────
    pub adapters: Arc<AdapterRegistry>,

    // ── Cost / Budget Controller ──────────────────────────────────────
    pub cost_estimators: Arc<Vec<Arc<dyn CostEstimator>>>,
    pub budget: Arc<BudgetController>,

    // ── Audit Pipeline ────────────────────────────────────────────────
    pub audit: Arc<AuditRecorder>,
    pub siem_queue: Option<Arc<SiemQueue>>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the admin bearer token. `None` disables admin
    /// endpoints entirely rather than allowing unauthenticated access.
    pub admin_token_hash: Option<Vec<u8>>,
    /// Principals trusted to call `/v1/authorize` and `/v1/invoke`, keyed
    /// by the SHA-256 hash of their bearer token, carrying the roles,
    /// trust level, and revocation instant presented tokens resolve to.
    /// Issuing these tokens is out of scope here; this only validates
    /// tokens handed to it out of band.
    pub trusted_principals: Arc<std::collections::HashMap<Vec<u8>, Principal>>,
}
