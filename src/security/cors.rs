//! CORS gatekeeper middleware.
//!
//! Runs before any proxy or handler stage. A denied origin never reaches the
//! upstream or a mounted handler.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::{CorsConfig, CorsMode};
use crate::observability::metrics;

/// Methods advertised on pre-flight responses.
pub const ALLOWED_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// Outcome of checking a request's `Origin` against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsDecision {
    /// Origin present and accepted.
    Allowed,
    /// No `Origin` header: same-origin or server-to-server call.
    NoOrigin,
    /// Origin present and rejected by the allow-list.
    Denied(String),
}

impl CorsDecision {
    pub fn is_denied(&self) -> bool {
        matches!(self, CorsDecision::Denied(_))
    }
}

/// Immutable CORS policy built from configuration.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    mode: CorsMode,
    allowed_origins: Vec<String>,
    allow_headers: HeaderValue,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let allow_headers = HeaderValue::from_str(&config.allowed_headers.join(", "))
            .unwrap_or_else(|_| {
                tracing::warn!("Invalid cors.allowed_headers, using the defaults");
                HeaderValue::from_static("Origin, X-Requested-With, Content-Type, Accept")
            });

        Self {
            mode: config.mode,
            allowed_origins: config.allowed_origins.clone(),
            allow_headers,
        }
    }

    /// Pure decision over (policy, request origin).
    pub fn evaluate(&self, origin: Option<&str>) -> CorsDecision {
        let Some(origin) = origin else {
            return CorsDecision::NoOrigin;
        };

        match self.mode {
            CorsMode::Open => CorsDecision::Allowed,
            CorsMode::AllowList => {
                if self.allowed_origins.iter().any(|allowed| allowed == origin) {
                    CorsDecision::Allowed
                } else {
                    CorsDecision::Denied(origin.to_string())
                }
            }
        }
    }

    /// Add the permissive CORS headers unless a later stage already set them.
    fn decorate(&self, headers: &mut HeaderMap) {
        headers
            .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .or_insert(HeaderValue::from_static("*"));
        headers
            .entry(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .or_insert_with(|| self.allow_headers.clone());
    }
}

pub async fn cors_gatekeeper(
    State(policy): State<Arc<CorsPolicy>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // An Origin header that is not valid UTF-8 cannot be on any allow-list
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .map(|value| value.to_str().unwrap_or("<invalid>").to_string());

    let decision = policy.evaluate(origin.as_deref());

    if let CorsDecision::Denied(origin) = &decision {
        tracing::warn!(
            origin = %origin,
            method = %req.method(),
            path = %req.uri().path(),
            "Origin rejected by CORS policy"
        );
        metrics::record_cors_denied();
        let mut response = (StatusCode::FORBIDDEN, "Not allowed by CORS").into_response();
        policy.decorate(response.headers_mut());
        return response;
    }

    if is_preflight(&req) {
        let mut response = StatusCode::NO_CONTENT.into_response();
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        policy.decorate(response.headers_mut());
        return response;
    }

    req.extensions_mut().insert(decision);
    let mut response = next.run(req).await;
    policy.decorate(response.headers_mut());
    response
}

fn is_preflight(req: &Request<Body>) -> bool {
    req.method() == Method::OPTIONS
        && req.headers().contains_key(header::ORIGIN)
        && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}
