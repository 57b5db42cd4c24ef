//! Bearer-token authentication: `PrincipalAuth` resolves the caller's
//! [`Principal`] from a trusted-token table; `AdminGuard` gates the admin
//! surface behind a single admin token. Both hash the presented token and
//! compare in constant time, the same pattern the teacher used for its
//! single-token API auth.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use sark_domain::Principal;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

fn bearer_token(parts: &Parts) -> &str {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("")
}

/// Resolves the calling [`Principal`] from its bearer token. Issuing or
/// managing these tokens is out of scope; this only validates tokens
/// handed to the gateway out of band via `trusted_principals`.
pub struct PrincipalAuth(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for PrincipalAuth {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts);
        let hash = Sha256::digest(token.as_bytes()).to_vec();

        let principal = state
            .trusted_principals
            .iter()
            .find(|(known_hash, _)| bool::from(known_hash.as_slice().ct_eq(&hash)))
            .map(|(_, principal)| principal.clone());

        match principal {
            Some(principal) if principal.is_revoked_as_of(Utc::now()) => Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "principal has been revoked" })),
            )),
            Some(principal) => Ok(PrincipalAuth(principal)),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "invalid or missing bearer token" })),
            )),
        }
    }
}

/// Enforces the admin bearer token. `None` configured token disables
/// admin endpoints entirely (rejects every request) rather than allowing
/// unauthenticated access, since the admin surface can reload policy and
/// override budgets.
pub struct AdminGuard;

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let expected_hash = match &state.admin_token_hash {
            Some(h) => h,
            None => {
                return Err((
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(serde_json::json!({ "error": "admin surface disabled: no admin token configured" })),
                ))
            }
        };

        let token = bearer_token(parts);
        let provided_hash = Sha256::digest(token.as_bytes());

        if bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
            Ok(AdminGuard)
        } else {
            Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "invalid admin token" })),
            ))
        }
    }
}
