//! Security response headers and double-submit CSRF protection for the
//! admin surface, applied the same way `api::auth::require_api_token`
//! applies bearer-token auth: as an `axum::middleware::from_fn` layer.

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Adds the standard defensive response headers to every response.
/// Stateless, so it doesn't need `AppState`.
pub async fn security_headers(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=63072000; includeSubDomains"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    response
}

const CSRF_HEADER: &str = "x-sark-csrf-token";
const CSRF_COOKIE: &str = "sark_csrf";

/// Double-submit CSRF check for state-changing admin requests: the token
/// in the `X-Sark-Csrf-Token` header must match the token in the
/// `sark_csrf` cookie. Safe methods (GET/HEAD/OPTIONS) are exempt.
pub async fn require_csrf_double_submit(req: Request<Body>, next: Next) -> Response {
    if matches!(req.method().as_str(), "GET" | "HEAD" | "OPTIONS") {
        return next.run(req).await;
    }

    let header_token = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cookie_token = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').map(str::trim).find_map(|c| {
                c.strip_prefix(&format!("{CSRF_COOKIE}="))
                    .map(str::to_string)
            })
        });

    match (header_token, cookie_token) {
        (Some(h), Some(c)) if !h.is_empty() && h == c => next.run(req).await,
        _ => (
            StatusCode::FORBIDDEN,
            axum::Json(serde_json::json!({ "error": "missing or mismatched CSRF token" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/state-changing", post(|| async { "ok" }))
            .route("/read-only", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(require_csrf_double_submit))
    }

    #[tokio::test]
    async fn get_requests_bypass_csrf_check() {
        let response = app()
            .oneshot(Request::builder().uri("/read-only").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_without_tokens_is_rejected() {
        let response = app()
            .oneshot(Request::builder().method("POST").uri("/state-changing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn post_with_matching_tokens_is_allowed() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/state-changing")
                    .header("x-sark-csrf-token", "abc")
                    .header(header::COOKIE, "sark_csrf=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_with_mismatched_tokens_is_rejected() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/state-changing")
                    .header("x-sark-csrf-token", "abc")
                    .header(header::COOKIE, "sark_csrf=xyz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
