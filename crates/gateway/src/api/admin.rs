//! Admin surface: policy bundle reload, budget introspection, adapter
//! health, recent decisions. Every route is gated by [`AdminGuard`]; the
//! state-changing ones additionally require the double-submit CSRF check
//! applied at the router layer.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::auth::AdminGuard;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub failing_adapters: Vec<AdapterFailure>,
}

#[derive(Debug, Serialize)]
pub struct AdapterFailure {
    pub adapter: String,
    pub error: String,
}

pub async fn health(_admin: AdminGuard, State(state): State<AppState>) -> Json<HealthReport> {
    let failures = state.adapters.initialize().await;
    Json(HealthReport {
        healthy: failures.is_empty(),
        failing_adapters: failures
            .into_iter()
            .map(|(adapter, error)| AdapterFailure { adapter, error: error.to_string() })
            .collect(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ReloadBundleBody {
    pub bundle_contents: String,
}

/// Validates and records a bundle reload in the policy change log.
/// Re-registering the plugins that implement the new bundle's rules is
/// out of scope here — this gateway has no dynamic plugin-loading
/// surface, so a reload only bumps the version and audit trail an
/// operator can correlate against a coordinated redeploy. The bundle
/// text is still the one place untrusted plugin-like source enters the
/// engine, so it's rejected outright if it trips the sandbox's static
/// scan.
pub async fn reload_bundle(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Json(body): Json<ReloadBundleBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.policy_engine.reload_bundle("admin", &body.bundle_contents) {
        Ok(entry) => (
            StatusCode::OK,
            Json(serde_json::json!({ "version": entry.version, "content_hash": entry.content_hash })),
        ),
        Err(violation) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": violation.to_string() })),
        ),
    }
}

pub async fn change_log(_admin: AdminGuard, State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "entries": state.policy_engine.change_log() }))
}

pub async fn budgets(_admin: AdminGuard, State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "principals": state.budget.snapshot() }))
}

pub async fn recent_audit_events(_admin: AdminGuard, State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "events": state.audit.recent() }))
}

#[derive(Debug, Deserialize)]
pub struct UnregisterAdapterBody {
    pub adapter: String,
}

pub async fn unregister_adapter(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Json(body): Json<UnregisterAdapterBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    if state.adapters.unregister(&body.adapter) {
        (StatusCode::OK, Json(serde_json::json!({ "unregistered": body.adapter })))
    } else {
        (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "unknown adapter" })))
    }
}
