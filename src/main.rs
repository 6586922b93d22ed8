//! Reputation Gateway
//!
//! Aggregates risk opinions from several threat-intelligence providers into
//! one cached verdict per domain.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                  REPUTATION GATEWAY                   │
//!                        │                                                       │
//!   POST /api/v1/check   │  ┌─────────┐   ┌──────────┐   ┌───────────┐           │
//!  ──────────────────────┼─▶│  http   │──▶│ ingress  │──▶│   cache   │──hit──┐   │
//!                        │  │ server  │   │ limiter  │   │   store   │       │   │
//!                        │  └─────────┘   └──────────┘   └─────┬─────┘       │   │
//!                        │                                     │ miss        │   │
//!                        │                                     ▼             │   │
//!                        │                              ┌─────────────┐      │   │
//!                        │                              │ aggregator  │      │   │
//!                        │                              └──────┬──────┘      │   │
//!                        │                   ┌─────────────────┼────────┐    │   │
//!                        │                   ▼                 ▼        ▼    │   │
//!                        │              ┌─────────┐      ┌─────────┐  ...    │   │
//!                        │              │ retry + │      │ retry + │         │   │
//!                        │              │ timeout │      │ timeout │         │   │
//!                        │              └────┬────┘      └────┬────┘         │   │
//!                        └───────────────────┼────────────────┼──────────────┼───┘
//!                                            ▼                ▼              ▼
//!                                        source A         source B     risk verdict
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use reputation_gateway::config::{load_config, GatewayConfig};
use reputation_gateway::gateway::ReputationService;
use reputation_gateway::http::HttpServer;
use reputation_gateway::lifecycle::{wait_for_signal, Maintenance, Shutdown};
use reputation_gateway::observability::{logging, metrics};
use reputation_gateway::time::SystemClock;

#[derive(Parser)]
#[command(name = "reputation-gateway")]
#[command(about = "URL reputation aggregation gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults apply when
    /// omitted and no `gateway.toml` exists in the working directory.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_path = args
        .config
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()));
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "reputation-gateway starting");

    tracing::info!(
        config = ?config_path,
        bind_address = %config.listener.bind_address,
        sources = config.sources.iter().filter(|s| s.enabled).count(),
        cache_ttl_secs = config.cache.ttl_secs,
        ingress_limit = config.ingress.limit,
        rate_limit_policy = ?config.aggregation.rate_limit_policy,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    if config.sources.iter().all(|s| !s.enabled) {
        tracing::warn!("No reputation sources enabled; every uncached check will fail");
    }

    let service = Arc::new(ReputationService::from_config(&config, Arc::new(SystemClock))?);
    let shutdown = Shutdown::new();

    let mut maintenance = Maintenance::new(
        service.cache().clone(),
        Duration::from_secs(config.cache.sweep_interval_secs),
        Duration::from_secs(config.cache.flush_interval_secs),
    );
    if let Some(limiter) = service.limiter() {
        maintenance = maintenance.with_limiter(
            limiter.clone(),
            Duration::from_secs(config.ingress.sweep_interval_secs),
        );
    }
    let maintenance_task = tokio::spawn(maintenance.run(shutdown.subscribe()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(&config, service);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();

    if let Err(e) = server_task.await? {
        tracing::error!(error = %e, "HTTP server exited with error");
    }
    maintenance_task.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
