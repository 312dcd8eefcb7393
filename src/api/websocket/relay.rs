//! Relay WebSocket handler
//!
//! Bridges one upgraded socket to a [`ConnectionSession`]: the read half
//! feeds the session, the write half drains the client's outbound buffer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::server::AppState;
use crate::error::{RelayError, Result};
use crate::relay::{ClientHandle, ConnectionId, ConnectionSession, EventSource};

/// How long a closing connection may spend flushing queued frames
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Which half of the connection stopped first
enum Finished {
    Writer,
    Session,
}

/// WebSocket upgrade handler for relay clients
pub async fn relay_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_relay_ws(socket, state))
}

/// Read half of an upgraded socket
struct WsSource(SplitStream<WebSocket>);

#[async_trait]
impl EventSource for WsSource {
    async fn next_message(&mut self) -> Option<Result<String>> {
        loop {
            match self.0.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes).map_err(|e| {
                        RelayError::Transport(format!("binary frame is not UTF-8: {}", e))
                    }))
                }
                Ok(Message::Close(_)) => return None,
                // Pong is handled automatically by axum
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Handle one relay connection until either half gives out
async fn handle_relay_ws(socket: WebSocket, state: AppState) {
    let id = ConnectionId::new();
    let (handle, channels) = ClientHandle::new(id, state.config.client_buffer);
    let handle = Arc::new(handle);
    let (sender, receiver) = socket.split();

    info!(conn = %id, "Relay WebSocket connected");
    state.stats.connection_opened();

    let mut send_task = tokio::spawn(write_frames(sender, channels.outbound));

    let mut session = ConnectionSession::new(
        handle.clone(),
        state.registry.clone(),
        state.events.clone(),
        state.stats.clone(),
        state.config.location_trail,
    );
    let closed = channels.closed;
    let mut receive_task = tokio::spawn(async move {
        session.run(WsSource(receiver), closed).await;
    });

    let finished = tokio::select! {
        _ = &mut send_task => Finished::Writer,
        _ = &mut receive_task => Finished::Session,
    };

    state.registry.remove(id);
    handle.close();
    drop(handle);

    // A finished JoinHandle must not be polled again; only the other half is awaited.
    match finished {
        Finished::Writer => {
            debug!(conn = %id, "Writer ended");
            receive_task.abort();
            let _ = receive_task.await;
        }
        Finished::Session => {
            debug!(conn = %id, "Session ended");
            // Every sender is gone now, so the writer flushes what is queued and exits
            if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut send_task)
                .await
                .is_err()
            {
                debug!(conn = %id, "Writer did not drain in time");
                send_task.abort();
                let _ = send_task.await;
            }
        }
    }

    state.stats.connection_closed();
    info!(conn = %id, "Relay WebSocket disconnected");
}

/// Forward queued frames to the socket until a write fails
async fn write_frames(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = sender.send(Message::Text(frame)).await {
            debug!(error = %e, "WebSocket write failed");
            break;
        }
    }
    let _ = sender.close().await;
}
