//! Shared utilities for integration tests: a stub upstream and an in-process gateway.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;

use api_gateway::config::{Environment, GatewayConfig};
use api_gateway::lifecycle::{self, Shutdown};
use api_gateway::routing::ModuleRegistry;
use api_gateway::GatewayServer;

/// Counters shared with the stub's handlers.
#[derive(Default)]
struct Counters {
    hits: AtomicUsize,
    sockets_closed: AtomicUsize,
}

/// A running stub upstream.
pub struct Upstream {
    pub addr: SocketAddr,
    counters: Arc<Counters>,
}

impl Upstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far.
    pub fn hits(&self) -> usize {
        self.counters.hits.load(Ordering::SeqCst)
    }

    /// WebSocket sessions whose upstream side has ended.
    pub fn sockets_closed(&self) -> usize {
        self.counters.sockets_closed.load(Ordering::SeqCst)
    }
}

/// Start the stub upstream on an ephemeral port:
/// - `/health` → 204, empty body
/// - `/slow` → 200 after `SLOW_UPSTREAM`
/// - `/ws` → WebSocket echo
/// - anything else → JSON echo of method, path, query, Host and body
pub async fn start_upstream() -> Upstream {
    let counters = Arc::new(Counters::default());
    let app = Router::new()
        .route("/health", get(health))
        .route("/slow", get(slow))
        .route("/ws", get(ws_echo))
        .fallback(echo)
        .with_state(counters.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Upstream { addr, counters }
}

/// How long `/slow` holds its response headers.
pub const SLOW_UPSTREAM: Duration = Duration::from_secs(3);

async fn health(State(counters): State<Arc<Counters>>) -> StatusCode {
    counters.hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn slow(State(counters): State<Arc<Counters>>) -> &'static str {
    counters.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(SLOW_UPSTREAM).await;
    "finally"
}

async fn echo(
    State(counters): State<Arc<Counters>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    counters.hits.fetch_add(1, Ordering::SeqCst);
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "host": host,
        "proxyAuthorization": headers.contains_key(header::PROXY_AUTHORIZATION),
        "boardId": headers.get("x-board-id").and_then(|v| v.to_str().ok()),
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn ws_echo(State(counters): State<Arc<Counters>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    counters.hits.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| async move {
        echo_socket(socket).await;
        counters.sockets_closed.fetch_add(1, Ordering::SeqCst);
    })
}

async fn echo_socket(mut socket: WebSocket) {
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(_) | Message::Binary(_) => {
                if socket.send(msg).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Config for a gateway in front of `upstream_url`.
pub fn test_config(upstream_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.environment = Environment::Test;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.proxy.target = upstream_url.to_string();
    config.timeouts.connect_secs = 2;
    config.timeouts.request_secs = 5;
    config
}

/// A running gateway. Dropping it stops the server.
pub struct TestGateway {
    pub addr: SocketAddr,
    _shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

/// Lay out one discoverable file per registered module, run startup and serve.
pub async fn spawn_gateway(mut config: GatewayConfig, registry: ModuleRegistry) -> TestGateway {
    let root = tempfile::tempdir().unwrap();
    for module_id in registry.module_ids() {
        let file = root.path().join(format!("{}.rs", module_id));
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "").unwrap();
    }
    config.discovery.root = root.path().display().to_string();

    let table = lifecycle::prepare(&config, &registry).await.unwrap();
    let server = GatewayServer::new(config, table).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    TestGateway {
        addr,
        _shutdown: shutdown,
    }
}

/// HTTP client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
