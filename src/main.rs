//! switchyard - RPC dispatch server
//!
//! Serves JSON-coded messages over TCP, routing each one to a registered
//! service handler.

use std::sync::Arc;
use switchyard_protocol::JsonCodec;
use switchyard_server::config::CONFIG_ENV;
use switchyard_server::metrics::run_metrics_server;
use switchyard_server::system::system_service;
use switchyard_server::{Config, Metrics, Server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // An explicitly named config file must load; otherwise defaults apply.
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var(CONFIG_ENV) {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            if std::env::var(CONFIG_ENV).is_ok() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::from_env()
        }
    };

    tracing::info!("Starting switchyard server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    match config.network.idle_timeout() {
        Some(timeout) => tracing::info!("  Idle timeout: {:?}", timeout),
        None => tracing::info!("  Idle timeout: disabled"),
    }
    if config.network.max_connections > 0 {
        tracing::info!("  Connection limit: {}", config.network.max_connections);
    }

    let metrics = if config.metrics.enabled {
        tracing::info!("  Metrics: enabled ({})", config.metrics.bind_addr);
        Some(Arc::new(Metrics::new()?))
    } else {
        tracing::info!("  Metrics: disabled");
        None
    };

    let server = Arc::new(Server::new(
        config.server_config(metrics.clone()),
        JsonCodec::new(),
    ));
    server.register_service(system_service(server.registry()))?;

    if let Some(metrics) = metrics {
        let addr = config.metrics.bind_addr;
        let shutdown = server.subscribe_shutdown();
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(addr, metrics, shutdown).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Blocks until shutdown.
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
