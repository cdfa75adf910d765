//! HTTP gateway library.
//!
//! Terminates HTTP and WebSocket traffic, applies a CORS policy, forwards one
//! path prefix to a fixed upstream and serves discovered route modules under
//! another prefix behind a uniform JSON error boundary.

pub mod app;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::{GatewayServer, Pipeline};
pub use lifecycle::Shutdown;
