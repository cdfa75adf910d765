//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Connect to the upstream WebSocket before accepting the client handshake
//! - Complete upgrade handshake with client
//! - Bidirectional frame forwarding
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Gateway ←──── WebSocket frames ────→ Upstream
//! ```
//!
//! # Design Decisions
//! - Upstream connect failures surface as 502/504 while the client still speaks HTTP
//! - Frame-level forwarding (no message buffering)
//! - Close frames propagated in both directions
//! - Ping/pong answered by each side's own WebSocket stack

use std::time::Duration;

use axum::{
    extract::ws::{self, WebSocket, WebSocketUpgrade},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        protocol::{frame::coding::CloseCode, CloseFrame},
    },
    MaybeTlsStream, WebSocketStream,
};

use crate::observability::metrics;
use crate::proxy::ProxyState;
use crate::security::headers::strip_hop_by_hop;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handshake headers regenerated by the upstream client, never copied.
static HANDSHAKE_HEADERS: [header::HeaderName; 3] = [
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_EXTENSIONS,
];

pub(crate) async fn proxy_websocket(
    state: &ProxyState,
    upgrade: WebSocketUpgrade,
    parts: &Parts,
    rewritten: &str,
) -> Response {
    let url = state.upstream.ws_url(rewritten, parts.uri.query());

    let mut request = match url.as_str().into_client_request() {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Invalid upstream WebSocket request");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };
    copy_forwardable(&parts.headers, request.headers_mut());

    let connect = tokio::time::timeout(
        Duration::from_secs(state.connect_timeout_secs),
        connect_async(request),
    );

    let (upstream, handshake) = match connect.await {
        Ok(Ok(connected)) => connected,
        Ok(Err(e)) => {
            tracing::error!(url = %url, error = %e, "Upstream WebSocket connect failed");
            metrics::record_websocket_session("upstream_failed");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
        Err(_) => {
            tracing::warn!(url = %url, "Upstream WebSocket connect timed out");
            metrics::record_websocket_session("upstream_timeout");
            return (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response();
        }
    };

    let protocol = handshake
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let upgrade = match protocol {
        Some(protocol) => upgrade.protocols([protocol]),
        None => upgrade,
    };

    tracing::debug!(url = %url, "Upstream WebSocket connected, upgrading client");

    upgrade
        .on_failed_upgrade(|e| {
            tracing::warn!(error = %e, "Client WebSocket upgrade failed");
            metrics::record_websocket_session("client_failed");
        })
        .on_upgrade(move |client| relay(client, upstream))
}

fn copy_forwardable(from: &HeaderMap, to: &mut HeaderMap) {
    let mut headers = from.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    // The upstream request already carries its own handshake headers
    for name in HANDSHAKE_HEADERS.iter() {
        headers.remove(name);
    }
    for (name, value) in headers.iter() {
        to.append(name.clone(), value.clone());
    }
}

/// Forward frames both ways until either side closes.
async fn relay(client: WebSocket, upstream: UpstreamSocket) {
    metrics::record_websocket_session("opened");

    let (mut client_sink, mut client_stream) = client.split();
    let (mut upstream_sink, mut upstream_stream) = upstream.split();

    let client_to_upstream = async {
        while let Some(msg) = client_stream.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(error = %e, "Client WebSocket error");
                    break;
                }
            };
            let closing = matches!(msg, ws::Message::Close(_));
            if let Some(msg) = to_upstream(msg) {
                if let Err(e) = upstream_sink.send(msg).await {
                    tracing::debug!(error = %e, "Failed to send to upstream");
                    break;
                }
            }
            if closing {
                break;
            }
        }
    };

    let upstream_to_client = async {
        while let Some(msg) = upstream_stream.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(error = %e, "Upstream WebSocket error");
                    break;
                }
            };
            let closing = matches!(msg, tungstenite::Message::Close(_));
            if let Some(msg) = to_client(msg) {
                if let Err(e) = client_sink.send(msg).await {
                    tracing::debug!(error = %e, "Failed to send to client");
                    break;
                }
            }
            if closing {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => tracing::debug!("Client side of WebSocket closed"),
        _ = upstream_to_client => tracing::debug!("Upstream side of WebSocket closed"),
    }

    // Whichever side is still open gets a close frame
    let _ = upstream_sink.close().await;
    let _ = client_sink.close().await;

    metrics::record_websocket_session("closed");
}

fn to_upstream(msg: ws::Message) -> Option<tungstenite::Message> {
    match msg {
        ws::Message::Text(text) => Some(tungstenite::Message::Text(text.as_str().to_owned().into())),
        ws::Message::Binary(data) => Some(tungstenite::Message::Binary(data)),
        ws::Message::Close(frame) => Some(tungstenite::Message::Close(frame.map(|f| CloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        }))),
        ws::Message::Ping(_) | ws::Message::Pong(_) => None,
    }
}

fn to_client(msg: tungstenite::Message) -> Option<ws::Message> {
    match msg {
        tungstenite::Message::Text(text) => Some(ws::Message::Text(text.as_str().to_owned().into())),
        tungstenite::Message::Binary(data) => Some(ws::Message::Binary(data)),
        tungstenite::Message::Close(frame) => Some(ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        }))),
        tungstenite::Message::Ping(_)
        | tungstenite::Message::Pong(_)
        | tungstenite::Message::Frame(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_copy_forwardable_drops_handshake_and_host() {
        let mut from = HeaderMap::new();
        from.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        from.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
        from.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        from.insert(header::SEC_WEBSOCKET_KEY, HeaderValue::from_static("dGhlIHNhbXBsZSBub25jZQ=="));
        from.insert(header::SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13"));
        from.insert(header::SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("graphql-ws"));
        from.insert(header::COOKIE, HeaderValue::from_static("session=1"));

        let mut to = HeaderMap::new();
        copy_forwardable(&from, &mut to);

        assert_eq!(to.len(), 2);
        assert_eq!(to[header::SEC_WEBSOCKET_PROTOCOL], "graphql-ws");
        assert_eq!(to[header::COOKIE], "session=1");
    }

    #[test]
    fn test_message_translation() {
        let up = to_upstream(ws::Message::Text("hi".to_string().into())).unwrap();
        assert_eq!(up, tungstenite::Message::Text("hi".to_string().into()));

        let close = to_client(tungstenite::Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".to_string().into(),
        })))
        .unwrap();
        match close {
            ws::Message::Close(Some(frame)) => {
                assert_eq!(frame.code, 1000);
                assert_eq!(frame.reason.as_str(), "bye");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(to_client(tungstenite::Message::Ping(Default::default())).is_none());
    }
}
