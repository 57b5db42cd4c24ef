use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Principal
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The caller an invocation is attributed to — the unit rate limits,
/// budgets, and audit events key off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Principal {
    pub id: String,
    pub kind: PrincipalKind,
    /// What the principal fundamentally is, independent of how it
    /// authenticated.
    #[serde(default)]
    pub principal_type: PrincipalType,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Capability labels attached directly to the principal, independent
    /// of the resource-scoped [`Capability`] a given call targets.
    #[serde(default)]
    pub capability_labels: Vec<String>,
    #[serde(default)]
    pub trust_level: TrustLevel,
    /// Free-form deployment environment label (`"prod"`, `"staging"`, …).
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub mfa_verified_at: Option<chrono::DateTime<chrono::Utc>>,
    /// `Some(instant)` once revoked. A principal is rejected at
    /// authentication once `instant` is no later than now.
    #[serde(default)]
    pub revoked_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    ApiKey,
    User,
    Service,
}

/// What a principal fundamentally is. Orthogonal to [`PrincipalKind`],
/// which describes how it authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    #[default]
    Human,
    Service,
    Agent,
    Device,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Trusted,
    #[default]
    Limited,
    Untrusted,
}

impl Principal {
    /// A minimal principal with every attribute defaulted — the id and
    /// auth kind are the only two every call site actually has to hand.
    pub fn new(id: impl Into<String>, kind: PrincipalKind) -> Self {
        Self {
            id: id.into(),
            kind,
            principal_type: PrincipalType::default(),
            roles: Vec::new(),
            teams: Vec::new(),
            permissions: Vec::new(),
            capability_labels: Vec::new(),
            trust_level: TrustLevel::default(),
            environment: String::new(),
            mfa_verified_at: None,
            revoked_at: None,
        }
    }

    /// Rate-limit/budget key precedence: api_key > user > service.
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.kind_str(), self.id)
    }

    fn kind_str(&self) -> &'static str {
        match self.kind {
            PrincipalKind::ApiKey => "api_key",
            PrincipalKind::User => "user",
            PrincipalKind::Service => "service",
        }
    }

    /// A principal whose revocation instant has arrived or passed is
    /// rejected at authentication, regardless of how it authenticated.
    pub fn is_revoked_as_of(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.revoked_at.is_some_and(|revoked_at| revoked_at <= now)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resource / Capability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The wire protocol a [`Resource`] is reachable over. The Adapter Registry
/// dispatches on this, never on the resource's logical identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    Mcp,
    Http,
    Grpc,
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::Mcp => write!(f, "mcp"),
            ProtocolKind::Http => write!(f, "http"),
            ProtocolKind::Grpc => write!(f, "grpc"),
        }
    }
}

/// A downstream endpoint registered with the gateway. Resources are
/// discovered by adapters, not declared by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub protocol: ProtocolKind,
    pub endpoint: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A named operation a [`Resource`] exposes. Sensitivity drives decision
/// cache TTL and, indirectly, which policies apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub resource_id: String,
    pub name: String,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Sensitivity {
    /// Decision cache TTL in seconds. `critical` is never cached.
    pub fn cache_ttl_secs(&self) -> u64 {
        match self {
            Sensitivity::Low => 1800,
            Sensitivity::Medium => 300,
            Sensitivity::High => 60,
            Sensitivity::Critical => 0,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Invocation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A caller's request to invoke a capability on a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub request_id: String,
    pub principal: Principal,
    pub resource_id: String,
    pub capability_id: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    /// Policy-salient context: time of day, origin, session attributes.
    /// Never includes argument values — those aren't part of the cache key.
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Outcome of invoking a capability through a [`crate::BoxStream`]-capable
/// or unary adapter call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub usage: Option<crate::stream::Usage>,
    #[serde(default)]
    pub error: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Decision / Cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Output of policy evaluation for one (principal, action, resource,
/// capability) tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub reason: String,
    /// Parameter Filter directives to apply before invocation, keyed by
    /// dotted JSON path.
    #[serde(default)]
    pub filtered_parameters: Vec<FilterDirective>,
    /// TTL the Authorization Orchestrator should cache this decision for,
    /// derived from the capability's sensitivity unless the policy bundle
    /// overrides it.
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub policy_version: Option<String>,
}

/// A single Parameter Filter directive (spec §4.13).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FilterDirective {
    Drop { path: String },
    Redact { path: String, replacement: String },
    Allowlist { path: String, keys: Vec<String> },
}

/// An entry held by the Decision Cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub decision: Decision,
    pub expires_at: std::time::Instant,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Audit
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single immutable record of an authorization/invocation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub principal_id: String,
    pub action: String,
    pub resource_id: String,
    pub capability_id: String,
    pub decision_allowed: bool,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub estimated_cost: Option<Decimal>,
    #[serde(default)]
    pub actual_cost: Option<Decimal>,
    #[serde(default)]
    pub details: serde_json::Value,
    /// SHA-256 over the canonicalized event bytes (all fields above,
    /// excluding this one), hex-encoded.
    pub integrity_hash: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cost / Budget
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A cost attribution record, written once per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub principal_id: String,
    pub resource_id: String,
    pub capability_id: String,
    #[serde(default)]
    pub estimated_cost: Option<Decimal>,
    #[serde(default)]
    pub actual_cost: Option<Decimal>,
    pub currency: String,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

impl CostRecord {
    /// Cost to count against budget: actual when known, else estimated.
    pub fn attributed_cost(&self) -> Decimal {
        self.actual_cost
            .or(self.estimated_cost)
            .unwrap_or(Decimal::ZERO)
    }
}

/// A principal's budget limit and current period spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub principal_id: String,
    pub limit: Option<Decimal>,
    pub spent: Decimal,
    pub period_start: chrono::NaiveDate,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Circuit breaker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl From<u8> for CircuitState {
    fn from(v: u8) -> Self {
        match v {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl From<CircuitState> for u8 {
    fn from(s: CircuitState) -> u8 {
        match s {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitivity_ttl_table() {
        assert_eq!(Sensitivity::Low.cache_ttl_secs(), 1800);
        assert_eq!(Sensitivity::Medium.cache_ttl_secs(), 300);
        assert_eq!(Sensitivity::High.cache_ttl_secs(), 60);
        assert_eq!(Sensitivity::Critical.cache_ttl_secs(), 0);
    }

    #[test]
    fn principal_identifier_includes_kind() {
        let p = Principal::new("abc123", PrincipalKind::ApiKey);
        assert_eq!(p.identifier(), "api_key:abc123");
    }

    #[test]
    fn principal_defaults_are_unrevoked_and_limited_trust() {
        let p = Principal::new("abc123", PrincipalKind::ApiKey);
        assert!(!p.is_revoked_as_of(chrono::Utc::now()));
        assert_eq!(p.trust_level, TrustLevel::Limited);
        assert_eq!(p.principal_type, PrincipalType::Human);
    }

    #[test]
    fn principal_revoked_in_the_past_is_rejected() {
        let mut p = Principal::new("abc123", PrincipalKind::ApiKey);
        p.revoked_at = Some(chrono::Utc::now() - chrono::Duration::seconds(1));
        assert!(p.is_revoked_as_of(chrono::Utc::now()));
    }

    #[test]
    fn principal_revoked_in_the_future_is_not_yet_rejected() {
        let mut p = Principal::new("abc123", PrincipalKind::ApiKey);
        p.revoked_at = Some(chrono::Utc::now() + chrono::Duration::seconds(60));
        assert!(!p.is_revoked_as_of(chrono::Utc::now()));
    }

    #[test]
    fn principal_role_and_permission_lookups() {
        let mut p = Principal::new("abc123", PrincipalKind::ApiKey);
        p.roles.push("approver".into());
        p.permissions.push("budget.override".into());
        assert!(p.has_role("approver"));
        assert!(!p.has_role("admin"));
        assert!(p.has_permission("budget.override"));
        assert!(!p.has_permission("admin.write"));
    }

    #[test]
    fn cost_record_prefers_actual_over_estimated() {
        let rec = CostRecord {
            principal_id: "p".into(),
            resource_id: "r".into(),
            capability_id: "c".into(),
            estimated_cost: Some(Decimal::new(500, 2)),
            actual_cost: Some(Decimal::new(750, 2)),
            currency: "USD".into(),
            recorded_at: chrono::Utc::now(),
        };
        assert_eq!(rec.attributed_cost(), Decimal::new(750, 2));
    }

    #[test]
    fn circuit_state_roundtrips_through_u8() {
        for s in [CircuitState::Closed, CircuitState::Open, CircuitState::HalfOpen] {
            let raw: u8 = s.into();
            assert_eq!(CircuitState::from(raw), s);
        }
    }
}
