//! Broadcaster
//!
//! Sole consumer of the broadcast channel. Each dequeued event is written
//! to every connection registered at that moment, in enqueue order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use super::registry::ConnectionRegistry;
use crate::models::Event;

/// Relay-wide counters, shared with the status endpoint
#[derive(Debug, Default)]
pub struct RelayStats {
    events_accepted: AtomicU64,
    events_broadcast: AtomicU64,
    frames_delivered: AtomicU64,
    clients_dropped: AtomicU64,
    connections_active: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub events_accepted: u64,
    pub events_broadcast: u64,
    pub frames_delivered: u64,
    pub clients_dropped: u64,
    pub connections_active: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self) {
        self.events_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_fan_out(&self, report: FanOutReport) {
        self.events_broadcast.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.clients_dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_broadcast: self.events_broadcast.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            clients_dropped: self.clients_dropped.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of fanning one event out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    events: mpsc::Receiver<Event>,
    stats: Arc<RelayStats>,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        events: mpsc::Receiver<Event>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            registry,
            events,
            stats,
        }
    }

    /// Run until shutdown or until every producer is gone
    #[instrument(skip(self, shutdown))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Broadcaster started");

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    match event {
                        Some(event) => {
                            self.fan_out(&event);
                        }
                        None => {
                            info!("Broadcast channel closed, broadcaster stopping");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Broadcaster shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Write one event to every registered connection.
    ///
    /// The registry is snapshotted once; connections whose write fails are
    /// removed and closed, and the rest still receive the event.
    pub fn fan_out(&self, event: &Event) -> FanOutReport {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "Failed to serialize event");
                return FanOutReport::default();
            }
        };

        let mut report = FanOutReport::default();
        for client in self.registry.snapshot() {
            match client.send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(conn = %client.id(), error = %e, "Dropping client after failed write");
                    self.registry.remove(client.id());
                    client.close();
                    report.dropped += 1;
                }
            }
        }

        debug!(
            event_type = %event.event_type,
            delivered = report.delivered,
            dropped = report.dropped,
            "Event broadcast"
        );
        self.stats.record_fan_out(report);
        report
    }
}
