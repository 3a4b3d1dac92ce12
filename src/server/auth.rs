//! HTTP Basic authentication middleware.
//!
//! Access is driven by `user|password|permissions` rules; an empty rule set
//! disables authentication entirely. Besides the `Authorization: Basic`
//! header, a base64 `?token=` query parameter is accepted as a credential
//! carrier so media-element URLs can authenticate. Any valid credential may
//! read; mutating methods additionally require an `rw` rule.

use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::config::AuthRule;

/// Authentication rules for the API surface.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    rules: Vec<AuthRule>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(rules: Vec<AuthRule>) -> Self {
        Self { rules }
    }

    /// Whether any rule is configured; no rules means open access.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.rules.is_empty()
    }

    fn authenticate(&self, user: &str, password: &str) -> Option<&AuthRule> {
        self.rules
            .iter()
            .find(|rule| rule.user == user && rule.password == password)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenParam {
    token: Option<String>,
}

fn is_write(method: &Method) -> bool {
    !(method == Method::GET || method == Method::HEAD || method == Method::OPTIONS)
}

/// Decode a base64 `user:password` payload.
fn decode_credentials(encoded: &str) -> Option<(String, String)> {
    let bytes = BASE64.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Extract credentials from an `Authorization: Basic` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    decode_credentials(encoded)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"findex\"")],
        Json(serde_json::json!({ "error": "authentication required" })),
    )
        .into_response()
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": "write permission required" })),
    )
        .into_response()
}

/// Middleware gating the API routes.
pub async fn require_auth(
    State(auth): State<Arc<AuthConfig>>,
    Query(params): Query<TokenParam>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.is_enabled() {
        return next.run(req).await;
    }

    let creds = basic_credentials(req.headers())
        .or_else(|| params.token.as_deref().and_then(decode_credentials));

    match creds.and_then(|(user, password)| auth.authenticate(&user, &password)) {
        Some(rule) if is_write(req.method()) && !rule.can_write => forbidden(),
        Some(_) => next.run(req).await,
        None => unauthorized(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::{get, post};
    use axum::{middleware, Router};
    use tower::ServiceExt;

    fn rules() -> Vec<AuthRule> {
        vec![
            AuthRule {
                user: "reader".to_string(),
                password: "ro".to_string(),
                can_write: false,
            },
            AuthRule {
                user: "writer".to_string(),
                password: "rw".to_string(),
                can_write: true,
            },
        ]
    }

    fn guarded_router(auth: AuthConfig) -> Router {
        Router::new()
            .route("/read", get(|| async { "ok" }))
            .route("/write", post(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                Arc::new(auth),
                require_auth,
            ))
    }

    fn basic_header(user: &str, password: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{user}:{password}")))
    }

    #[test]
    fn test_decode_credentials() {
        let encoded = BASE64.encode("alice:secret");
        assert_eq!(
            decode_credentials(&encoded),
            Some(("alice".to_string(), "secret".to_string()))
        );
        assert_eq!(decode_credentials("not base64!!"), None);
        assert_eq!(decode_credentials(&BASE64.encode("no-colon")), None);
    }

    #[test]
    fn test_authenticate_matches_exact_pair() {
        let auth = AuthConfig::new(rules());
        assert!(auth.authenticate("reader", "ro").is_some());
        assert!(auth.authenticate("reader", "rw").is_none());
        assert!(auth.authenticate("ghost", "ro").is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_get_401_with_challenge() {
        let app = guarded_router(AuthConfig::new(rules()));
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/read")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(challenge.starts_with("Basic"));
    }

    #[tokio::test]
    async fn test_reader_can_read_but_not_write() {
        let auth = AuthConfig::new(rules());

        let response = guarded_router(auth.clone())
            .oneshot(
                HttpRequest::builder()
                    .uri("/read")
                    .header(header::AUTHORIZATION, basic_header("reader", "ro"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = guarded_router(auth)
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/write")
                    .header(header::AUTHORIZATION, basic_header("reader", "ro"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_writer_can_write() {
        let response = guarded_router(AuthConfig::new(rules()))
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/write")
                    .header(header::AUTHORIZATION, basic_header("writer", "rw"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_token_query_parameter_authenticates() {
        let token = BASE64.encode("reader:ro");
        let response = guarded_router(AuthConfig::new(rules()))
            .oneshot(
                HttpRequest::builder()
                    .uri(format!("/read?token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_no_rules_disable_auth() {
        let response = guarded_router(AuthConfig::default())
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/write")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
