//! HTTP server setup.
//!
//! # Responsibilities
//! - Assemble the request pipeline from config and the route table
//! - Bind the pipeline to a listener
//! - Stop accepting on the shutdown signal and drain in-flight requests

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::GatewayConfig;
use crate::http::pipeline::Pipeline;
use crate::proxy::ProxyError;
use crate::routing::RouteTable;

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: Arc<GatewayConfig>,
}

impl GatewayServer {
    /// Build the server with the default pipeline for the configured environment.
    pub fn new(config: GatewayConfig, table: RouteTable) -> Result<Self, ProxyError> {
        let config = Arc::new(config);
        let router = Pipeline::new(config.clone(), table).build()?;
        Ok(Self { router, config })
    }

    /// The assembled router, e.g. for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires (or its sender is dropped).
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.config.environment,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
