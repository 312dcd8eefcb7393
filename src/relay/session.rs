//! Per-connection session loop
//!
//! Reads inbound messages, validates them, registers the client on its
//! first valid join and hands accepted events to the broadcaster.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use super::broadcaster::RelayStats;
use super::client::ClientHandle;
use super::registry::{ConnectionRegistry, RegisterOutcome};
use super::trail::LocationTrail;
use crate::error::{RelayError, Result};
use crate::models::{Event, EventPayload, Response, USERNAME_TAKEN};

/// Read side of a client connection
#[async_trait]
pub trait EventSource: Send {
    /// Next raw message from the peer. `None` means the peer closed.
    async fn next_message(&mut self) -> Option<Result<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingJoin,
    Joined,
    Closed,
}

pub struct ConnectionSession {
    handle: Arc<ClientHandle>,
    registry: Arc<ConnectionRegistry>,
    events: mpsc::Sender<Event>,
    stats: Arc<RelayStats>,
    trail: LocationTrail,
    state: SessionState,
}

impl ConnectionSession {
    pub fn new(
        handle: Arc<ClientHandle>,
        registry: Arc<ConnectionRegistry>,
        events: mpsc::Sender<Event>,
        stats: Arc<RelayStats>,
        trail_capacity: usize,
    ) -> Self {
        Self {
            handle,
            registry,
            events,
            stats,
            trail: LocationTrail::new(trail_capacity),
            state: SessionState::AwaitingJoin,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn trail(&self) -> &LocationTrail {
        &self.trail
    }

    /// Drive the session until the peer goes away, the relay closes the
    /// connection, or the broadcaster is gone. Always deregisters on exit.
    #[instrument(skip_all, fields(conn = %self.handle.id()))]
    pub async fn run<S: EventSource>(&mut self, mut source: S, mut closed: watch::Receiver<bool>) {
        debug!("Session started");

        loop {
            let message = tokio::select! {
                _ = closed.changed() => {
                    debug!("Connection closed by relay");
                    break;
                }
                message = source.next_message() => message,
            };

            let raw = match message {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => {
                    warn!(error = %e, "Error reading message");
                    break;
                }
                None => {
                    debug!("Connection closed by peer");
                    break;
                }
            };

            // A frame that is not an event envelope means the read side is unusable.
            let event: Event = match serde_json::from_str(&raw) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Error decoding event");
                    break;
                }
            };

            if let Err(e) = self.handle_event(event).await {
                error!(error = %e, "Cannot forward events");
                break;
            }
        }

        self.registry.remove(self.handle.id());
        self.handle.close();
        self.state = SessionState::Closed;
        debug!("Session closed");
    }

    /// Process one decoded event. Only a dead broadcast channel is an error.
    pub async fn handle_event(&mut self, event: Event) -> Result<()> {
        let payload = match event.parse() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, event_type = %event.event_type, "Invalid event");
                return Ok(());
            }
        };

        match payload {
            EventPayload::JoinedLobby(join) => {
                match self.registry.try_register(&self.handle, &join.username) {
                    RegisterOutcome::Registered => {
                        self.state = SessionState::Joined;
                        info!(username = %join.username, color = %join.color, "Someone joined the lobby");
                        self.enqueue(event).await
                    }
                    outcome => {
                        warn!(username = %join.username, ?outcome, "Join rejected");
                        self.reply_error(USERNAME_TAKEN);
                        Ok(())
                    }
                }
            }
            EventPayload::LocationUpdate(update) => {
                self.trail.push(update.coordinates());
                debug!(
                    username = %update.username,
                    x = update.x,
                    y = update.y,
                    trail_len = self.trail.len(),
                    "Location update"
                );
                self.enqueue(event).await
            }
        }
    }

    async fn enqueue(&self, event: Event) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| RelayError::BroadcastClosed)?;
        self.stats.record_accepted();
        Ok(())
    }

    fn reply_error(&self, message: &str) {
        let frame = match Response::error(message).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "Failed to serialize error response");
                return;
            }
        };
        if let Err(e) = self.handle.send(frame) {
            debug!(error = %e, "Could not deliver error response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::client::{ClientChannels, ConnectionId};
    use serde_json::json;

    struct ScriptedSource(mpsc::UnboundedReceiver<Result<String>>);

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn next_message(&mut self) -> Option<Result<String>> {
            self.0.recv().await
        }
    }

    struct Harness {
        registry: Arc<ConnectionRegistry>,
        events_rx: mpsc::Receiver<Event>,
        events_tx: mpsc::Sender<Event>,
        stats: Arc<RelayStats>,
    }

    impl Harness {
        fn new() -> Self {
            let (events_tx, events_rx) = mpsc::channel(16);
            Self {
                registry: Arc::new(ConnectionRegistry::new()),
                events_rx,
                events_tx,
                stats: Arc::new(RelayStats::new()),
            }
        }

        fn session(&self) -> (ConnectionSession, ClientChannels) {
            let (handle, channels) = ClientHandle::new(ConnectionId::new(), 8);
            let session = ConnectionSession::new(
                Arc::new(handle),
                self.registry.clone(),
                self.events_tx.clone(),
                self.stats.clone(),
                16,
            );
            (session, channels)
        }
    }

    fn event(value: serde_json::Value) -> Event {
        serde_json::from_str(&value.to_string()).unwrap()
    }

    fn join(username: &str, color: &str) -> Event {
        event(json!({ "type": 1, "payload": { "username": username, "color": color } }))
    }

    fn location(username: &str, x: f64, y: f64) -> Event {
        event(json!({ "type": 2, "payload": { "username": username, "x": x, "y": y } }))
    }

    #[tokio::test]
    async fn test_join_registers_and_enqueues() {
        let mut h = Harness::new();
        let (mut session, mut channels) = h.session();

        session.handle_event(join("a", "red")).await.unwrap();

        assert_eq!(session.state(), SessionState::Joined);
        assert_eq!(
            h.registry.username_of(session.handle.id()),
            Some("a".to_string())
        );
        let queued = h.events_rx.try_recv().unwrap();
        assert_eq!(
            serde_json::to_string(&queued).unwrap(),
            serde_json::to_string(&join("a", "red")).unwrap()
        );
        assert!(channels.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_second_join_replies_error_without_broadcast() {
        let mut h = Harness::new();
        let (mut session, mut channels) = h.session();

        session.handle_event(join("a", "red")).await.unwrap();
        h.events_rx.try_recv().unwrap();

        session.handle_event(join("b", "blue")).await.unwrap();

        let frame: serde_json::Value =
            serde_json::from_str(&channels.outbound.try_recv().unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({ "type": "error", "payload": { "error": "Username already exists" } })
        );
        assert!(h.events_rx.try_recv().is_err());
        assert_eq!(h.registry.usernames(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_taken_username_rejected_for_other_connection() {
        let mut h = Harness::new();
        let (mut c1, _c1_channels) = h.session();
        let (mut c2, mut c2_channels) = h.session();

        c1.handle_event(join("a", "red")).await.unwrap();
        c2.handle_event(join("a", "blue")).await.unwrap();

        assert_eq!(c2.state(), SessionState::AwaitingJoin);
        assert!(c2_channels.outbound.try_recv().is_ok());
        assert_eq!(h.registry.len(), 1);
        assert!(h.events_rx.try_recv().is_ok());
        assert!(h.events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_location_before_join_is_still_forwarded() {
        let mut h = Harness::new();
        let (mut session, _channels) = h.session();

        session.handle_event(location("ghost", 1.0, 2.0)).await.unwrap();

        assert_eq!(session.state(), SessionState::AwaitingJoin);
        assert!(h.registry.is_empty());
        assert!(h.events_rx.try_recv().is_ok());
        assert_eq!(session.trail().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_events_are_discarded() {
        let mut h = Harness::new();
        let (mut session, mut channels) = h.session();

        for bad in [
            location("a", 0.0, 0.0),
            join("", "red"),
            event(json!({ "type": 0, "payload": {} })),
            event(json!({ "type": 5, "payload": { "username": "a" } })),
            event(json!({ "type": 1 })),
        ] {
            session.handle_event(bad).await.unwrap();
        }

        assert!(h.events_rx.try_recv().is_err());
        assert!(channels.outbound.try_recv().is_err());
        assert!(session.trail().is_empty());
        assert_eq!(h.stats.snapshot().events_accepted, 0);
    }

    #[tokio::test]
    async fn test_enqueue_fails_once_broadcaster_is_gone() {
        let h = Harness::new();
        let (mut session, _channels) = h.session();
        drop(h.events_rx);

        let err = session.handle_event(join("a", "red")).await.unwrap_err();
        assert!(matches!(err, RelayError::BroadcastClosed));
    }

    #[tokio::test]
    async fn test_run_survives_validation_errors_and_cleans_up_on_close() {
        let mut h = Harness::new();
        let (mut session, channels) = h.session();
        let id = session.handle.id();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(Ok(json!({ "type": 1, "payload": { "username": "a", "color": "red" } }).to_string()))
            .unwrap();
        tx.send(Ok(json!({ "type": 2, "payload": { "username": "a", "x": 0, "y": 0 } }).to_string()))
            .unwrap();
        tx.send(Ok(json!({ "type": 2, "payload": { "username": "a", "x": 1.5, "y": 2.5 } }).to_string()))
            .unwrap();
        drop(tx);

        session.run(ScriptedSource(rx), channels.closed).await;

        assert_eq!(session.state(), SessionState::Closed);
        assert!(!h.registry.contains(id));
        assert!(session.handle.is_closed());
        assert_eq!(h.events_rx.try_recv().unwrap().event_type, crate::models::EventType::JoinedLobby);
        assert_eq!(
            h.events_rx.try_recv().unwrap().event_type,
            crate::models::EventType::LocationUpdate
        );
        assert!(h.events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_terminates_on_undecodable_frame() {
        let mut h = Harness::new();
        let (mut session, channels) = h.session();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(Ok(json!({ "type": 1, "payload": { "username": "a", "color": "red" } }).to_string()))
            .unwrap();
        tx.send(Ok("this is not json".to_string())).unwrap();
        tx.send(Ok(json!({ "type": 2, "payload": { "username": "a", "x": 1, "y": 1 } }).to_string()))
            .unwrap();

        session.run(ScriptedSource(rx), channels.closed).await;

        assert_eq!(session.state(), SessionState::Closed);
        assert!(h.registry.is_empty());
        assert!(h.events_rx.try_recv().is_ok());
        // Nothing after the bad frame was read
        assert!(h.events_rx.try_recv().is_err());
        drop(tx);
    }

    #[tokio::test]
    async fn test_run_keeps_reading_after_untyped_envelope() {
        let mut h = Harness::new();
        let (mut session, channels) = h.session();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(Ok(json!({ "payload": { "username": "a", "color": "red" } }).to_string()))
            .unwrap();
        tx.send(Ok(json!({ "type": null, "payload": { "username": "a", "color": "red" } }).to_string()))
            .unwrap();
        tx.send(Ok(json!({ "type": 1, "payload": { "username": "a", "color": "red" } }).to_string()))
            .unwrap();
        drop(tx);

        session.run(ScriptedSource(rx), channels.closed).await;

        let queued = h.events_rx.try_recv().unwrap();
        assert_eq!(queued.event_type, crate::models::EventType::JoinedLobby);
        assert!(h.events_rx.try_recv().is_err());
        assert_eq!(h.stats.snapshot().events_accepted, 1);
    }

    #[tokio::test]
    async fn test_run_terminates_on_read_error() {
        let h = Harness::new();
        let (mut session, channels) = h.session();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(Err(RelayError::Transport("reset by peer".to_string())))
            .unwrap();

        session.run(ScriptedSource(rx), channels.closed).await;
        assert_eq!(session.state(), SessionState::Closed);
        drop(tx);
    }

    #[tokio::test]
    async fn test_run_stops_when_relay_closes_connection() {
        let h = Harness::new();
        let (mut session, channels) = h.session();
        let handle = session.handle.clone();
        let (_tx, rx) = mpsc::unbounded_channel();

        handle.close();
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            session.run(ScriptedSource(rx), channels.closed),
        )
        .await
        .expect("session should stop once closed");

        assert_eq!(session.state(), SessionState::Closed);
    }
}
