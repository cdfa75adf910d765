//! Reverse proxy to the single fixed upstream.
//!
//! # Data Flow
//! ```text
//! /proxy/<path>
//!     → upstream.rs (strip prefix, apply rewrite, join upstream base)
//!     → WebSocket upgrade? websocket.rs (frame relay)
//!     → otherwise: forward via reqwest, stream the response back
//! ```
//!
//! # Design Decisions
//! - Host is rewritten to the upstream's own authority
//! - Hop-by-hop headers stripped on both legs
//! - Unreachable upstream → 502, no response headers in time → 504
//! - Failures are answered here, never by the handler error boundary

pub mod upstream;
pub mod websocket;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, HttpBody},
    extract::{FromRequestParts, State, ws::WebSocketUpgrade},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::security::headers::{is_websocket_upgrade, strip_hop_by_hop};

pub use upstream::Upstream;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid upstream target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// State shared by every proxied request.
#[derive(Clone)]
pub struct ProxyState {
    pub upstream: Arc<Upstream>,
    pub client: reqwest::Client,
    pub websocket: bool,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl ProxyState {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ProxyError> {
        let upstream = Upstream::from_config(&config.proxy)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;

        tracing::info!(
            prefix = %upstream.prefix(),
            target = %upstream.target(),
            websocket = config.proxy.websocket,
            "Proxy configured"
        );

        Ok(Self {
            upstream: Arc::new(upstream),
            client,
            websocket: config.proxy.websocket,
            connect_timeout_secs: config.timeouts.connect_secs,
            request_timeout_secs: config.timeouts.request_secs,
        })
    }
}

/// Router for every path the mounted handlers do not claim: paths under the
/// proxy prefix are forwarded, everything else is 404. Using the fallback
/// keeps `/proxy`, `/proxy/` and `/proxy/...` on one segment-aware match.
pub fn router(state: ProxyState) -> Router {
    Router::new().fallback(proxy_handler).with_state(state)
}

/// Forward one request (or WebSocket session) to the upstream.
async fn proxy_handler(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let Some(rewritten) = state.upstream.rewrite_path(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let (mut parts, body) = request.into_parts();

    if is_websocket_upgrade(&parts.headers) {
        if !state.websocket {
            return (StatusCode::BAD_REQUEST, "WebSocket proxying is disabled").into_response();
        }
        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => return rejection.into_response(),
        };
        tracing::debug!(path = %path, upstream_path = %rewritten, "Proxying WebSocket");
        return websocket::proxy_websocket(&state, upgrade, &parts, &rewritten).await;
    }

    let url = state.upstream.http_url(&rewritten, parts.uri.query());

    tracing::debug!(
        method = %method,
        path = %path,
        upstream = %url,
        "Proxying request"
    );

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    // reqwest derives Host from the upstream URL
    headers.remove(header::HOST);

    let mut upstream_request = state.client.request(parts.method, url.clone()).headers(headers);
    if body.size_hint().exact() != Some(0) {
        upstream_request = upstream_request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let sent = tokio::time::timeout(
        Duration::from_secs(state.request_timeout_secs),
        upstream_request.send(),
    )
    .await;

    let response = match sent {
        Ok(Ok(upstream_response)) => {
            let status = upstream_response.status();
            let mut headers = upstream_response.headers().clone();
            strip_hop_by_hop(&mut headers);

            let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            response
        }
        Ok(Err(e)) if e.is_timeout() => {
            tracing::warn!(upstream = %url, error = %e, "Upstream timed out");
            (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(upstream = %url, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
        Err(_) => {
            tracing::warn!(
                upstream = %url,
                timeout_secs = state.request_timeout_secs,
                "Upstream did not respond in time"
            );
            (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response()
        }
    };

    metrics::record_request("proxy", &method, response.status().as_u16(), start);
    response
}
