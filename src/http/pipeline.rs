//! Request pipeline assembly.
//!
//! # Stage order (per request)
//! ```text
//! logging hook            (development: request ID + TraceLayer)
//!   → hardening hook      (production: security headers)
//!     → CORS gatekeeper   (deny / pre-flight / decorate)
//!       → /api/*    error boundary → timeout → body limit → catch panic → handler
//!       → /proxy/*  reverse proxy (own failure statuses)
//!       → else      404
//! ```
//!
//! Axum applies the last `.layer` outermost, so `build` wraps from the inside
//! out: dispatch first, then the gatekeeper, then hardening, then logging.

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, Router};
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::GatewayConfig;
use crate::http::error::{error_boundary, mark_dispatched, panic_failure, ErrorBoundary};
use crate::observability::logging;
use crate::proxy::{self, ProxyError, ProxyState};
use crate::routing::RouteTable;
use crate::security::{cors_gatekeeper, headers, CorsPolicy};

/// A stage attached in front of the gatekeeper.
pub type Hook = Box<dyn FnOnce(Router) -> Router + Send>;

/// Builder for the full request pipeline.
pub struct Pipeline {
    config: Arc<GatewayConfig>,
    table: RouteTable,
    logging: Option<Hook>,
    hardening: Option<Hook>,
}

impl Pipeline {
    /// Pipeline with the default hooks for the configured environment.
    pub fn new(config: Arc<GatewayConfig>, table: RouteTable) -> Self {
        let logging: Option<Hook> = if config.environment.is_development() {
            Some(Box::new(logging::request_logging))
        } else {
            None
        };
        let hardening: Option<Hook> = if config.environment.is_production() {
            Some(Box::new(headers::harden))
        } else {
            None
        };

        Self {
            config,
            table,
            logging,
            hardening,
        }
    }

    /// Replace the request-logging stage.
    pub fn with_logging_hook<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(Router) -> Router + Send + 'static,
    {
        self.logging = Some(Box::new(hook));
        self
    }

    /// Replace the hardening stage.
    pub fn with_hardening_hook<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(Router) -> Router + Send + 'static,
    {
        self.hardening = Some(Box::new(hook));
        self
    }

    /// Drop the request-logging stage.
    pub fn without_logging(mut self) -> Self {
        self.logging = None;
        self
    }

    /// Drop the hardening stage.
    pub fn without_hardening(mut self) -> Self {
        self.hardening = None;
        self
    }

    /// Assemble the router.
    #[allow(deprecated)]
    pub fn build(self) -> Result<Router, ProxyError> {
        let config = self.config;
        let proxy_state = ProxyState::from_config(&config)?;
        let policy = Arc::new(CorsPolicy::from_config(&config.cors));

        let mut app = Router::new();

        if !self.table.is_empty() {
            let prefix = self.table.prefix().to_string();
            let mounted = self
                .table
                .into_router()
                .layer(middleware::map_response(mark_dispatched))
                .layer(CatchPanicLayer::custom(panic_failure))
                .layer(RequestBodyLimitLayer::new(config.api.body_limit_bytes))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(config.timeouts.request_secs),
                ))
                .layer(middleware::from_fn_with_state(
                    ErrorBoundary {
                        json_spaces: config.api.json_spaces,
                    },
                    error_boundary,
                ));
            app = app.nest(&prefix, mounted);
        } else {
            tracing::warn!("No route modules mounted");
        }

        let mut app = app
            .merge(proxy::router(proxy_state))
            .layer(middleware::from_fn_with_state(policy, cors_gatekeeper));

        if let Some(hardening) = self.hardening {
            app = hardening(app);
        }
        if let Some(logging) = self.logging {
            app = logging(app);
        }

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorsMode, Environment};
    use crate::routing::{mount, DiscoveredModule, ModuleRegistry, Routes};
    use axum::body::Body;
    use axum::http::{HeaderName, HeaderValue, Request};
    use axum::routing::get;
    use std::path::PathBuf;
    use tower::ServiceExt;
    use tower_http::set_header::SetResponseHeaderLayer;

    fn table() -> RouteTable {
        let registry = ModuleRegistry::new()
            .register("cards/cards_router", || Routes::new().route("/cards", get(|| async { "cards" })));
        let discovered = vec![DiscoveredModule {
            path: PathBuf::from("src/app/cards/cards_router.rs"),
            module_id: "cards/cards_router".to_string(),
        }];
        mount("/api", &discovered, &registry).unwrap()
    }

    fn config(environment: Environment) -> Arc<GatewayConfig> {
        let mut config = GatewayConfig::default();
        config.environment = environment;
        config.proxy.target = "http://127.0.0.1:9".to_string();
        config.cors.mode = CorsMode::AllowList;
        config.cors.allowed_origins = vec!["https://board.example.com".to_string()];
        Arc::new(config)
    }

    fn tag(value: &'static str) -> impl FnOnce(Router) -> Router + Send + 'static {
        move |router: Router| {
            router.layer(SetResponseHeaderLayer::overriding(
                HeaderName::from_static("x-stage"),
                HeaderValue::from_static(value),
            ))
        }
    }

    async fn send(app: Router, uri: &str, origin: Option<&str>) -> axum::response::Response {
        let mut request = Request::builder().uri(uri);
        if let Some(origin) = origin {
            request = request.header("origin", origin);
        }
        app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_mounted_routes_under_prefix() {
        let app = Pipeline::new(config(Environment::Test), table()).build().unwrap();
        assert_eq!(send(app.clone(), "/api/cards", None).await.status(), StatusCode::OK);
        assert_eq!(send(app.clone(), "/cards", None).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(send(app, "/api/boards", None).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_hooks_wrap_the_gatekeeper() {
        let app = Pipeline::new(config(Environment::Test), table())
            .with_logging_hook(tag("logging"))
            .build()
            .unwrap();

        let denied = send(app.clone(), "/api/cards", Some("https://evil.example.com")).await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(denied.headers()["x-stage"], "logging");

        let allowed = send(app, "/api/cards", Some("https://board.example.com")).await;
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(allowed.headers()["x-stage"], "logging");
    }

    #[tokio::test]
    async fn test_logging_hook_runs_outside_hardening() {
        let app = Pipeline::new(config(Environment::Test), table())
            .with_hardening_hook(tag("hardening"))
            .with_logging_hook(tag("logging"))
            .build()
            .unwrap();

        // The outermost overriding layer writes last
        let response = send(app, "/api/cards", None).await;
        assert_eq!(response.headers()["x-stage"], "logging");
    }

    #[tokio::test]
    async fn test_production_defaults_harden() {
        let app = Pipeline::new(config(Environment::Production), table()).build().unwrap();
        let response = send(app, "/api/cards", None).await;
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");

        let app = Pipeline::new(config(Environment::Production), table())
            .without_hardening()
            .build()
            .unwrap();
        let response = send(app, "/api/cards", None).await;
        assert!(response.headers().get("x-content-type-options").is_none());
    }

    #[test]
    fn test_invalid_target_fails_build() {
        let mut config = GatewayConfig::default();
        config.proxy.target = "ftp://files.example.com".to_string();
        let result = Pipeline::new(Arc::new(config), table()).without_logging().build();
        assert!(matches!(result, Err(ProxyError::InvalidTarget { .. })));
    }
}
