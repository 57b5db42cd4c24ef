//! `/v1/invoke` — the Invocation Orchestrator: look up the adapter for
//! the resource's protocol, validate, invoke, attribute actual cost,
//! record spend, and audit the outcome.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sark_adapters::AdapterError;
use sark_audit::NewAuditEvent;
use sark_cost::InvocationOutcome;
use sark_domain::{mask_secrets, CostRecord, InvocationRequest};
use serde::{Deserialize, Serialize};

use crate::api::auth::PrincipalAuth;
use crate::cost_estimate::estimate_cost;
use crate::state::AppState;

const ACTION: &str = "invoke";

#[derive(Debug, Deserialize)]
pub struct InvokeBody {
    pub resource_id: String,
    pub capability_id: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub context: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct InvokeResponse {
    pub success: bool,
    pub request_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub error: Option<String>,
}

/// Callers are expected to have already gone through `/v1/authorize` and
/// applied its `filtered_arguments`; this endpoint performs the
/// invocation itself and does not re-run policy evaluation.
pub async fn invoke(
    State(state): State<AppState>,
    PrincipalAuth(principal): PrincipalAuth,
    Json(body): Json<InvokeBody>,
) -> (StatusCode, Json<InvokeResponse>) {
    let request_id = uuid::Uuid::new_v4().to_string();
    let started = Instant::now();

    let request = InvocationRequest {
        request_id: request_id.clone(),
        principal: principal.clone(),
        resource_id: body.resource_id.clone(),
        capability_id: body.capability_id.clone(),
        arguments: body.arguments.clone(),
        context: body.context.clone(),
    };

    let Some((adapter_name, resource, capability)) =
        resolve(&state, &body.resource_id, &body.capability_id).await
    else {
        return fail(&state, &request, started, None, "unknown resource or capability");
    };

    let Ok(adapter) = state.adapters.get(&adapter_name) else {
        return fail(&state, &request, started, None, "adapter not registered");
    };

    if let Err(err) = adapter.validate_request(&capability, &request).await {
        return fail(&state, &request, started, Some(&err), "request validation failed");
    }

    // Pre-call estimate, for operators who want it in the response
    // metadata. `/v1/authorize` already ran this same estimate against
    // the budget gate; this call is a second, independent pricing for
    // the invocation actually about to happen, since an adapter's
    // resource metadata can legitimately have changed between the two
    // calls.
    let estimated_cost = estimate_cost(&state, &request, &resource.metadata).await;

    let outcome = adapter.invoke(&resource, &capability, &request).await;

    match outcome {
        Ok(result) => {
            let duration_ms = started.elapsed().as_millis() as u64;
            let actual_cost = record_actual_cost(
                &state,
                &request,
                &result,
                &resource.metadata,
                estimated_cost,
            )
            .await;

            state.audit.record(NewAuditEvent {
                principal_id: principal.id.clone(),
                action: ACTION.to_string(),
                resource_id: body.resource_id.clone(),
                capability_id: body.capability_id.clone(),
                decision_allowed: true,
                success: Some(result.success),
                duration_ms: Some(duration_ms),
                error_kind: result.error.clone(),
                estimated_cost,
                actual_cost,
                details: result.metadata.clone(),
            });

            (
                StatusCode::OK,
                Json(InvokeResponse {
                    success: result.success,
                    request_id,
                    data: result.data,
                    metadata: result.metadata,
                    error: result.error,
                }),
            )
        }
        Err(err) => fail(&state, &request, started, Some(&err), "invocation failed"),
    }
}

async fn resolve(
    state: &AppState,
    resource_id: &str,
    capability_id: &str,
) -> Option<(String, sark_domain::Resource, sark_domain::Capability)> {
    for adapter_name in state.adapters.names() {
        let Ok(adapter) = state.adapters.get(&adapter_name) else { continue };
        let Ok(resources) = adapter.discover_resources().await else { continue };
        let Some(resource) = resources.into_iter().find(|r| r.id == resource_id) else { continue };
        let Ok(capabilities) = adapter.get_capabilities(&resource).await else { continue };
        if let Some(capability) = capabilities.into_iter().find(|c| c.id == capability_id) {
            return Some((adapter_name, resource, capability));
        }
    }
    None
}

async fn record_actual_cost(
    state: &AppState,
    request: &InvocationRequest,
    result: &sark_domain::InvocationResult,
    resource_metadata: &serde_json::Value,
    estimated_cost: Option<rust_decimal::Decimal>,
) -> Option<rust_decimal::Decimal> {
    let outcome = InvocationOutcome { success: result.success, metadata: &result.metadata };

    let mut actual_cost = None;
    for estimator in state.cost_estimators.iter() {
        if let Ok(Some(estimate)) = estimator.record_actual(request, &outcome, resource_metadata).await {
            actual_cost = Some(estimate.estimated_cost);
            break;
        }
    }

    state.budget.record(&CostRecord {
        principal_id: request.principal.id.clone(),
        resource_id: request.resource_id.clone(),
        capability_id: request.capability_id.clone(),
        estimated_cost,
        actual_cost,
        currency: "USD".to_string(),
        recorded_at: chrono::Utc::now(),
    });

    actual_cost
}

fn fail(
    state: &AppState,
    request: &InvocationRequest,
    started: Instant,
    err: Option<&AdapterError>,
    reason: &str,
) -> (StatusCode, Json<InvokeResponse>) {
    let duration_ms = started.elapsed().as_millis() as u64;
    let error_kind = err.map(|e| e.kind().to_string());
    let message = mask_secrets(&err.map(|e| e.to_string()).unwrap_or_else(|| reason.to_string()));

    state.audit.record(NewAuditEvent {
        principal_id: request.principal.id.clone(),
        action: ACTION.to_string(),
        resource_id: request.resource_id.clone(),
        capability_id: request.capability_id.clone(),
        decision_allowed: true,
        success: Some(false),
        duration_ms: Some(duration_ms),
        error_kind,
        estimated_cost: None,
        actual_cost: None,
        details: serde_json::json!({ "reason": reason }),
    });

    let status = match err.map(|e| e.kind()) {
        Some("capability_not_found") | Some("resource_not_found") => StatusCode::NOT_FOUND,
        Some("validation") => StatusCode::BAD_REQUEST,
        None if reason == "unknown resource or capability" => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    };

    (
        status,
        Json(InvokeResponse {
            success: false,
            request_id: request.request_id.clone(),
            data: serde_json::json!({}),
            metadata: serde_json::json!({}),
            error: Some(message),
        }),
    )
}
