//! Relay server using Axum
//!
//! Owns the registry, the broadcast channel and the broadcaster task, and
//! serves the WebSocket endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::middleware;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

use crate::config::RelayServerConfig;
use crate::error::{RelayError, Result};
use crate::models::Event;
use crate::relay::{Broadcaster, ConnectionRegistry, RelayStats};

use super::middleware::RequestLogging;
use super::routes;

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    pub config: RelayServerConfig,
    pub registry: Arc<ConnectionRegistry>,
    /// Producer side of the broadcast channel
    pub events: mpsc::Sender<Event>,
    pub stats: Arc<RelayStats>,
    pub started_at: Instant,
}

/// Relay server
pub struct RelayServer {
    config: RelayServerConfig,
    state: AppState,
    broadcaster: Broadcaster,
}

impl RelayServer {
    /// Create a new relay server.
    ///
    /// The broadcast channel is bounded: a session whose enqueue finds it
    /// full waits until the broadcaster catches up.
    pub fn new(config: RelayServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let stats = Arc::new(RelayStats::new());
        let (events_tx, events_rx) = mpsc::channel(config.broadcast_capacity.max(1));

        let broadcaster = Broadcaster::new(registry.clone(), events_rx, stats.clone());
        let state = AppState {
            config: config.clone(),
            registry,
            events: events_tx,
            stats,
            started_at: Instant::now(),
        };

        Self {
            config,
            state,
            broadcaster,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone(), &self.config.ws_path)
            .layer(middleware::from_fn(RequestLogging::log_request))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown
    #[instrument(skip(self, shutdown))]
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(addr.as_str()).await?;
        info!("Relay server listening on {}", addr);

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(self, listener: TcpListener, shutdown: watch::Receiver<bool>) -> Result<()> {
        let router = self.router();
        let ws_path = self.config.ws_path.clone();

        let broadcaster_task = tokio::spawn(self.broadcaster.run(shutdown.clone()));
        info!("WebSocket endpoint at {}", ws_path);

        let mut server_shutdown = shutdown;
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
            .map_err(|e| RelayError::Internal(e.to_string()));

        // Sessions may still hold producers, so the broadcaster is only
        // guaranteed to stop on its own after a shutdown signal.
        if result.is_err() {
            broadcaster_task.abort();
        }
        match broadcaster_task.await {
            Err(e) if !e.is_cancelled() => error!("Broadcaster task failed: {}", e),
            _ => {}
        }

        info!("Relay server shut down");
        result
    }
}
