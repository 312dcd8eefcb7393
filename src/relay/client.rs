//! Outbound half of a relay connection

use std::fmt;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::error::{RelayError, Result};

/// Opaque identity of one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving ends paired with a [`ClientHandle`]
pub struct ClientChannels {
    /// Frames to write to the peer, drained by the connection's writer task
    pub outbound: mpsc::Receiver<String>,
    /// Flips to `true` once the relay has given up on the connection
    pub closed: watch::Receiver<bool>,
}

/// Handle used by the session and the broadcaster to write to one client.
///
/// Writes never block: frames go into a bounded buffer and a client that
/// cannot keep up is reported as failed so it can be dropped.
pub struct ClientHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<String>,
    closed: watch::Sender<bool>,
}

impl ClientHandle {
    pub fn new(id: ConnectionId, buffer: usize) -> (Self, ClientChannels) {
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);

        let handle = Self {
            id,
            outbound: outbound_tx,
            closed: closed_tx,
        };
        let channels = ClientChannels {
            outbound: outbound_rx,
            closed: closed_rx,
        };
        (handle, channels)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame for the peer
    pub fn send(&self, frame: String) -> Result<()> {
        if self.is_closed() {
            return Err(RelayError::ClientDisconnected { id: self.id });
        }

        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RelayError::ClientBufferFull { id: self.id },
            mpsc::error::TrySendError::Closed(_) => RelayError::ClientDisconnected { id: self.id },
        })
    }

    /// Tell the session to stop reading and release the transport. Idempotent.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
