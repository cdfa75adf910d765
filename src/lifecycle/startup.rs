//! Startup orchestration.
//!
//! # Responsibilities
//! - Discover route modules under the configured root
//! - Resolve and mount them into the route table
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Runs before the listener is bound (traffic only when ready)

use std::path::Path;

use thiserror::Error;

use crate::config::{ConfigError, GatewayConfig};
use crate::proxy::ProxyError;
use crate::routing::{self, DiscoveryError, ModuleRegistry, MountError, RouteTable};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("handler discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("route mounting failed: {0}")]
    Mount(#[from] MountError),

    #[error("proxy setup failed: {0}")]
    Proxy(#[from] ProxyError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Discover route modules and mount them under the API prefix.
pub async fn prepare(config: &GatewayConfig, registry: &ModuleRegistry) -> Result<RouteTable, StartupError> {
    let root = Path::new(&config.discovery.root);
    let discovered = routing::discover(root, &config.discovery.keyword).await?;

    tracing::info!(
        root = %root.display(),
        keyword = %config.discovery.keyword,
        modules = discovered.len(),
        registered = registry.len(),
        "Handler discovery complete"
    );

    let table = routing::mount(&config.api.prefix, &discovered, registry)?;

    if !table.shadowed().is_empty() {
        tracing::warn!(count = table.shadowed().len(), "Some routes were shadowed by earlier mounts");
    }
    tracing::info!(prefix = %table.prefix(), routes = table.len(), "Route table ready");

    Ok(table)
}
