//! `/v1/authorize` — the Authorization Orchestrator's 9-step flow:
//! authenticate -> rate-limit -> assemble input -> cache lookup (hit
//! short-circuits) -> policy eval on miss -> cost/budget check on allow
//! -> compute/apply TTL -> parameter filter -> audit + return.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use sark_audit::NewAuditEvent;
use sark_cache::cache_key;
use sark_domain::{Capability, Decision, InvocationRequest, Resource};
use serde::{Deserialize, Serialize};

use crate::api::auth::PrincipalAuth;
use crate::cost_estimate::estimate_cost;
use crate::parameter_filter;
use crate::state::AppState;

const ACTION: &str = "authorize";

#[derive(Debug, Deserialize)]
pub struct AuthorizeBody {
    pub resource_id: String,
    pub capability_id: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub context: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub allow: bool,
    pub reason: String,
    pub request_id: String,
    pub filtered_arguments: serde_json::Value,
    pub policy_version: Option<String>,
}

/// A deny always returns `200` with `allow: false` — authorization is a
/// business decision, not a transport error.
pub async fn authorize(
    State(state): State<AppState>,
    PrincipalAuth(principal): PrincipalAuth,
    Json(body): Json<AuthorizeBody>,
) -> (StatusCode, Json<AuthorizeResponse>) {
    let request_id = uuid::Uuid::new_v4().to_string();

    // Step 2: rate-limit.
    let rl_decision = state.rate_limiter.check(&principal.identifier());
    if !rl_decision.allowed {
        return deny(&state, &request_id, &principal.id, &body, "rate limit exceeded");
    }

    // Step 3: assemble input — resolve resource/capability from whatever
    // adapter currently reports them. A lookup failure here is fail-closed.
    let (resource, capability) = match resolve_resource_and_capability(&state, &body.resource_id, &body.capability_id).await {
        Some(pair) => pair,
        None => return deny(&state, &request_id, &principal.id, &body, "unknown resource or capability"),
    };

    let request = InvocationRequest {
        request_id: request_id.clone(),
        principal: principal.clone(),
        resource_id: body.resource_id.clone(),
        capability_id: body.capability_id.clone(),
        arguments: body.arguments.clone(),
        context: body.context.clone(),
    };

    // Step 4: cache lookup. A hit short-circuits straight to the filter
    // + audit tail; a cache backend failure degrades to a miss, never to
    // a hard error — `DecisionCache::get` already returns `None` for that.
    let key = cache_key(ACTION, &request);
    if let Some(cached) = state.decision_cache.get(&key) {
        return finish(&state, &request_id, &principal.id, &body, cached, body.arguments.clone()).await;
    }

    // Step 5: policy evaluation on miss. Fail-closed: the engine itself
    // never panics past this call (plugin errors are swallowed inside
    // `evaluate`), but any unexpected failure here should deny.
    let input = sark_policy::PolicyInput { request: &request, resource: &resource, capability: &capability };
    let mut decision = state.policy_engine.evaluate(&input).await;

    // Step 6: cost/budget check on allow. Fail-closed on budget errors.
    // No estimator pricing the call is treated as a zero-cost estimate,
    // the same fallback `CostRecord::attributed_cost` uses post-call —
    // it gates on what's knowable, it doesn't invent a cost.
    if decision.allow {
        let estimated_cost = estimate_cost(&state, &request, &resource.metadata).await.unwrap_or(Decimal::ZERO);
        if let Err(budget_err) = state.budget.check_budget(&principal.id, estimated_cost) {
            decision = Decision {
                allow: false,
                reason: budget_err.to_string(),
                filtered_parameters: Vec::new(),
                cache_ttl_secs: 0,
                policy_version: decision.policy_version,
            };
        }
    }

    // Step 7: compute/apply TTL, capped by capability sensitivity.
    let ttl_secs = decision.cache_ttl_secs.min(capability.sensitivity.cache_ttl_secs());
    if decision.allow && ttl_secs > 0 {
        state.decision_cache.put(key, decision.clone(), Duration::from_secs(ttl_secs));
    }

    finish(&state, &request_id, &principal.id, &body, decision, body.arguments.clone()).await
}

async fn finish(
    state: &AppState,
    request_id: &str,
    principal_id: &str,
    body: &AuthorizeBody,
    decision: Decision,
    mut arguments: serde_json::Value,
) -> (StatusCode, Json<AuthorizeResponse>) {
    // Step 8: parameter filter.
    parameter_filter::apply(&mut arguments, &decision.filtered_parameters);

    // Step 9: audit + return. Enqueuing to SIEM never blocks the response —
    // `AuditRecorder::record` only enqueues, it never waits on delivery.
    state.audit.record(NewAuditEvent {
        principal_id: principal_id.to_string(),
        action: ACTION.to_string(),
        resource_id: body.resource_id.clone(),
        capability_id: body.capability_id.clone(),
        decision_allowed: decision.allow,
        success: None,
        duration_ms: None,
        error_kind: None,
        estimated_cost: None,
        actual_cost: None,
        details: serde_json::json!({ "reason": decision.reason }),
    });

    (
        StatusCode::OK,
        Json(AuthorizeResponse {
            allow: decision.allow,
            reason: decision.reason,
            request_id: request_id.to_string(),
            filtered_arguments: arguments,
            policy_version: decision.policy_version,
        }),
    )
}

async fn deny(
    state: &AppState,
    request_id: &str,
    principal_id: &str,
    body: &AuthorizeBody,
    reason: &str,
) -> (StatusCode, Json<AuthorizeResponse>) {
    let decision = Decision {
        allow: false,
        reason: reason.to_string(),
        filtered_parameters: Vec::new(),
        cache_ttl_secs: 0,
        policy_version: None,
    };
    finish(state, request_id, principal_id, body, decision, body.arguments.clone()).await
}

async fn resolve_resource_and_capability(
    state: &AppState,
    resource_id: &str,
    capability_id: &str,
) -> Option<(Resource, Capability)> {
    for adapter_name in state.adapters.names() {
        let Ok(adapter) = state.adapters.get(&adapter_name) else { continue };
        let Ok(resources) = adapter.discover_resources().await else { continue };
        let Some(resource) = resources.into_iter().find(|r| r.id == resource_id) else { continue };
        let Ok(capabilities) = adapter.get_capabilities(&resource).await else { continue };
        if let Some(capability) = capabilities.into_iter().find(|c| c.id == capability_id) {
            return Some((resource, capability));
        }
    }
    None
}
