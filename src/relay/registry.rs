//! Connection registry
//!
//! Maps live connections to the username they joined with. Every operation
//! takes the lock once and does no I/O while holding it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::client::{ClientHandle, ConnectionId};

/// Result of a join attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    /// The connection already has an entry
    AlreadyJoined,
    /// Another live connection holds this username
    UsernameTaken,
}

impl RegisterOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, RegisterOutcome::Registered)
    }
}

struct RegistryEntry {
    username: String,
    handle: Arc<ClientHandle>,
}

/// Shared table of joined connections
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: Mutex<HashMap<ConnectionId, RegistryEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `username` unless it already joined or the
    /// name is held by someone else. Check and insert happen under one lock.
    pub fn try_register(&self, handle: &Arc<ClientHandle>, username: &str) -> RegisterOutcome {
        let mut clients = self.clients.lock();

        if clients.contains_key(&handle.id()) {
            return RegisterOutcome::AlreadyJoined;
        }
        if clients.values().any(|entry| entry.username == username) {
            return RegisterOutcome::UsernameTaken;
        }

        clients.insert(
            handle.id(),
            RegistryEntry {
                username: username.to_string(),
                handle: Arc::clone(handle),
            },
        );
        RegisterOutcome::Registered
    }

    /// Remove a connection. Returns whether an entry existed.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.clients.lock().remove(&id).is_some()
    }

    /// Handles of every registered connection, for iteration without the lock
    pub fn snapshot(&self) -> Vec<Arc<ClientHandle>> {
        self.clients
            .lock()
            .values()
            .map(|entry| Arc::clone(&entry.handle))
            .collect()
    }

    pub fn snapshot_keys(&self) -> Vec<ConnectionId> {
        self.clients.lock().keys().copied().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn username_of(&self, id: ConnectionId) -> Option<String> {
        self.clients.lock().get(&id).map(|entry| entry.username.clone())
    }

    /// Registered usernames, sorted
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .clients
            .lock()
            .values()
            .map(|entry| entry.username.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}
