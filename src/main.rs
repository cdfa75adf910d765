//! API gateway binary.
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                   GATEWAY                     │
//!   Client Request      │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!   ────────────────────┼─▶│ logging │──▶│hardening │──▶│   CORS    │  │
//!                       │  └─────────┘   └──────────┘   └─────┬─────┘  │
//!                       │                      ┌──────────────┴───┐    │
//!                       │                      ▼                  ▼    │
//!                       │               ┌────────────┐   ┌──────────┐  │
//!                       │               │ /api/*     │   │ /proxy/* │──┼──▶ Upstream
//!                       │               │ handlers + │   │ reverse  │  │
//!                       │               │ error      │   │ proxy    │  │
//!                       │               │ boundary   │   └──────────┘  │
//!                       │               └────────────┘                 │
//!                       └───────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::load_config;
use api_gateway::lifecycle::{self, signals, Shutdown, StartupError};
use api_gateway::observability::{logging, metrics};
use api_gateway::{app, GatewayServer};

#[derive(Parser, Debug)]
#[command(name = "api-gateway", version, about = "HTTP gateway with CORS, reverse proxy and discovered routes")]
struct Cli {
    /// Path to a TOML configuration file (defaults apply when omitted)
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).map_err(StartupError::from)?;

    logging::init(&config.observability, config.environment);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "api-gateway starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        api_prefix = %config.api.prefix,
        proxy_prefix = %config.proxy.prefix,
        proxy_target = %config.proxy.target,
        cors_mode = ?config.cors.mode,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let table = lifecycle::prepare(&config, &app::registry()).await?;

    let bind_address = config.listener.bind_address.clone();
    let server = GatewayServer::new(config, table).map_err(StartupError::from)?;

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    shutdown.trigger_on(signals::wait_for_signal());

    server.run(listener, stop).await.context("server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}
