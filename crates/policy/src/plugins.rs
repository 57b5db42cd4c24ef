//! Representative decision plugins, grounded on the business-hours and
//! cost-aware plugin examples referenced by the original policy/plugin
//! documentation.

use chrono::{Datelike, Timelike};
use chrono_tz::Tz;
use sark_domain::Decision;

use crate::engine::{DecisionPlugin, PolicyInput};

/// Denies outside a configured business-hours window, in a configured
/// timezone. Abstains (returns `None`) for capabilities not in its
/// `restricted_capabilities` set, so it composes cleanly with other
/// plugins instead of vetoing everything.
pub struct BusinessHoursPlugin {
    pub timezone: Tz,
    pub open_hour: u32,
    pub close_hour: u32,
    pub weekdays_only: bool,
    pub restricted_capabilities: Vec<String>,
}

impl DecisionPlugin for BusinessHoursPlugin {
    fn name(&self) -> &str {
        "business_hours"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn evaluate(&self, input: &PolicyInput<'_>) -> Option<Decision> {
        if !self
            .restricted_capabilities
            .iter()
            .any(|c| c == &input.capability.id)
        {
            return None;
        }

        let now = chrono::Utc::now().with_timezone(&self.timezone);
        let hour = now.hour();
        let in_hours = hour >= self.open_hour && hour < self.close_hour;
        let is_weekend = matches!(now.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun);

        let allow = in_hours && !(self.weekdays_only && is_weekend);
        Some(Decision {
            allow,
            reason: if allow {
                "within business hours".into()
            } else {
                "outside configured business hours".into()
            },
            filtered_parameters: Vec::new(),
            cache_ttl_secs: if allow { input.capability.sensitivity.cache_ttl_secs() } else { 0 },
            policy_version: None,
        })
    }
}

/// Denies capabilities whose declared per-call cost ceiling (in resource
/// metadata, `max_cost_usd`) exceeds a configured threshold, unless the
/// principal is on an allow-list. Abstains when no ceiling is declared.
pub struct CostAwarePlugin {
    pub max_cost_usd: f64,
    pub unrestricted_principals: Vec<String>,
}

impl DecisionPlugin for CostAwarePlugin {
    fn name(&self) -> &str {
        "cost_aware"
    }

    fn priority(&self) -> i32 {
        5
    }

    fn evaluate(&self, input: &PolicyInput<'_>) -> Option<Decision> {
        if self
            .unrestricted_principals
            .iter()
            .any(|p| p == &input.request.principal.id)
        {
            return None;
        }

        let ceiling = input
            .capability
            .metadata
            .get("max_cost_usd")
            .and_then(|v| v.as_f64())?;

        let allow = ceiling <= self.max_cost_usd;
        Some(Decision {
            allow,
            reason: if allow {
                "within cost ceiling".into()
            } else {
                format!("capability cost ceiling {ceiling} exceeds policy max {}", self.max_cost_usd)
            },
            filtered_parameters: Vec::new(),
            cache_ttl_secs: if allow { input.capability.sensitivity.cache_ttl_secs() } else { 0 },
            policy_version: None,
        })
    }
}

/// Denies capabilities that require a permission the calling principal
/// doesn't carry. Abstains for capabilities with no configured
/// requirement, and for an untrusted principal calling ANY capability in
/// `required_permissions`, regardless of its permission list.
pub struct RoleBasedPlugin {
    /// capability id -> permission required to call it.
    pub required_permissions: std::collections::HashMap<String, String>,
}

impl DecisionPlugin for RoleBasedPlugin {
    fn name(&self) -> &str {
        "role_based"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn evaluate(&self, input: &PolicyInput<'_>) -> Option<Decision> {
        let required = self.required_permissions.get(&input.capability.id)?;

        if input.request.principal.trust_level == sark_domain::TrustLevel::Untrusted {
            return Some(Decision {
                allow: false,
                reason: "untrusted principal may not call a permission-gated capability".into(),
                filtered_parameters: Vec::new(),
                cache_ttl_secs: 0,
                policy_version: None,
            });
        }

        let allow = input.request.principal.has_permission(required);
        Some(Decision {
            allow,
            reason: if allow {
                format!("principal holds required permission '{required}'")
            } else {
                format!("principal lacks required permission '{required}'")
            },
            filtered_parameters: Vec::new(),
            cache_ttl_secs: if allow { input.capability.sensitivity.cache_ttl_secs() } else { 0 },
            policy_version: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sark_domain::{Capability, InvocationRequest, Principal, PrincipalKind, Resource, ProtocolKind, Sensitivity};

    fn fixtures(cap_id: &str, metadata: serde_json::Value) -> (InvocationRequest, Resource, Capability) {
        let request = InvocationRequest {
            request_id: "r1".into(),
            principal: Principal::new("p1", PrincipalKind::ApiKey),
            resource_id: "res".into(),
            capability_id: cap_id.into(),
            arguments: serde_json::json!({}),
            context: serde_json::json!({}),
        };
        let resource = Resource {
            id: "res".into(),
            protocol: ProtocolKind::Http,
            endpoint: "https://example.test".into(),
            metadata: serde_json::json!({}),
        };
        let capability = Capability {
            id: cap_id.into(),
            resource_id: "res".into(),
            name: "do_thing".into(),
            sensitivity: Sensitivity::Medium,
            metadata,
        };
        (request, resource, capability)
    }

    #[test]
    fn business_hours_abstains_for_unlisted_capability() {
        let plugin = BusinessHoursPlugin {
            timezone: chrono_tz::UTC,
            open_hour: 9,
            close_hour: 17,
            weekdays_only: true,
            restricted_capabilities: vec!["other_cap".into()],
        };
        let (request, resource, capability) = fixtures("cap1", serde_json::json!({}));
        let input = PolicyInput { request: &request, resource: &resource, capability: &capability };
        assert!(plugin.evaluate(&input).is_none());
    }

    #[test]
    fn cost_aware_denies_above_ceiling() {
        let plugin = CostAwarePlugin { max_cost_usd: 1.0, unrestricted_principals: Vec::new() };
        let (request, resource, capability) = fixtures("cap1", serde_json::json!({"max_cost_usd": 5.0}));
        let input = PolicyInput { request: &request, resource: &resource, capability: &capability };
        let decision = plugin.evaluate(&input).expect("should evaluate");
        assert!(!decision.allow);
    }

    #[test]
    fn cost_aware_abstains_for_unrestricted_principal() {
        let plugin = CostAwarePlugin {
            max_cost_usd: 1.0,
            unrestricted_principals: vec!["p1".into()],
        };
        let (request, resource, capability) = fixtures("cap1", serde_json::json!({"max_cost_usd": 5.0}));
        let input = PolicyInput { request: &request, resource: &resource, capability: &capability };
        assert!(plugin.evaluate(&input).is_none());
    }

    #[test]
    fn cost_aware_abstains_without_declared_ceiling() {
        let plugin = CostAwarePlugin { max_cost_usd: 1.0, unrestricted_principals: Vec::new() };
        let (request, resource, capability) = fixtures("cap1", serde_json::json!({}));
        let input = PolicyInput { request: &request, resource: &resource, capability: &capability };
        assert!(plugin.evaluate(&input).is_none());
    }

    #[test]
    fn role_based_abstains_for_unrestricted_capability() {
        let plugin = RoleBasedPlugin { required_permissions: std::collections::HashMap::new() };
        let (request, resource, capability) = fixtures("cap1", serde_json::json!({}));
        let input = PolicyInput { request: &request, resource: &resource, capability: &capability };
        assert!(plugin.evaluate(&input).is_none());
    }

    #[test]
    fn role_based_denies_missing_permission() {
        let mut required_permissions = std::collections::HashMap::new();
        required_permissions.insert("cap1".to_string(), "admin.write".to_string());
        let plugin = RoleBasedPlugin { required_permissions };
        let (mut request, resource, capability) = fixtures("cap1", serde_json::json!({}));
        request.principal = Principal::new("p1", PrincipalKind::ApiKey);
        let input = PolicyInput { request: &request, resource: &resource, capability: &capability };
        let decision = plugin.evaluate(&input).expect("should evaluate");
        assert!(!decision.allow);
    }

    #[test]
    fn role_based_allows_with_permission() {
        let mut required_permissions = std::collections::HashMap::new();
        required_permissions.insert("cap1".to_string(), "admin.write".to_string());
        let plugin = RoleBasedPlugin { required_permissions };
        let (mut request, resource, capability) = fixtures("cap1", serde_json::json!({}));
        request.principal.permissions.push("admin.write".to_string());
        let input = PolicyInput { request: &request, resource: &resource, capability: &capability };
        let decision = plugin.evaluate(&input).expect("should evaluate");
        assert!(decision.allow);
    }

    #[test]
    fn role_based_denies_untrusted_principal_even_with_permission() {
        let mut required_permissions = std::collections::HashMap::new();
        required_permissions.insert("cap1".to_string(), "admin.write".to_string());
        let plugin = RoleBasedPlugin { required_permissions };
        let (mut request, resource, capability) = fixtures("cap1", serde_json::json!({}));
        request.principal.permissions.push("admin.write".to_string());
        request.principal.trust_level = sark_domain::TrustLevel::Untrusted;
        let input = PolicyInput { request: &request, resource: &resource, capability: &capability };
        let decision = plugin.evaluate(&input).expect("should evaluate");
        assert!(!decision.allow);
    }
}
