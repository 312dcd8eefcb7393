//! Tron Relay Server - Entry Point
//!
//! Starts the relay server with graceful shutdown support.

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tron_relay::config::{Config, LogConfig};
use tron_relay::RelayServer;

#[tokio::main]
async fn main() -> tron_relay::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log);

    info!("Starting Tron Relay Server");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = RelayServer::new(config.relay.clone());
    let mut server_task = tokio::spawn(async move { server.run(shutdown_rx).await });

    info!("Relay server starting on {}", config.relay_addr());

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
        // Startup failures (e.g. the port is taken) end the task early
        finished = &mut server_task => {
            return match finished {
                Ok(result) => result,
                Err(e) => Err(tron_relay::RelayError::Internal(e.to_string())),
            };
        }
    }

    match server_task.await {
        Ok(Err(e)) => error!("Relay server error: {}", e),
        Err(e) => error!("Relay server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    info!("Tron Relay Server stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("tron_relay={},tower_http=debug", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
