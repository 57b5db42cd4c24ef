pub mod admin;
pub mod auth;
pub mod authorize;
pub mod invoke;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::security;
use crate::state::AppState;

/// Build the full API router. Routes are split into **public** (no auth
/// required), **governed** (gated behind `PrincipalAuth`), and **admin**
/// (gated behind `AdminGuard` plus double-submit CSRF for state-changing
/// requests).
pub fn router() -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(health));

    let governed = Router::new()
        .route("/v1/authorize", post(authorize::authorize))
        .route("/v1/invoke", post(invoke::invoke));

    let admin = Router::new()
        .route("/v1/admin/health", get(admin::health))
        .route("/v1/admin/budgets", get(admin::budgets))
        .route("/v1/admin/audit", get(admin::recent_audit_events))
        .route("/v1/admin/policy/change-log", get(admin::change_log))
        .route("/v1/admin/policy/reload", post(admin::reload_bundle))
        .route("/v1/admin/adapters/unregister", post(admin::unregister_adapter))
        .layer(middleware::from_fn(security::require_csrf_double_submit));

    public
        .merge(governed)
        .merge(admin)
        .layer(middleware::from_fn(security::security_headers))
}

async fn health() -> &'static str {
    "ok"
}
