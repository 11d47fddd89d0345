//! The set of currently open connections.
//!
//! A connection is a member from the moment the transport reports it open
//! until the moment it reports it closed.  Both mutations are idempotent: a
//! duplicate open or a close for an unknown id is a silent no-op.
//!
//! Sessions run on many Tokio worker threads at once, so membership sits behind
//! a `std::sync::Mutex`.  The lock is only held for a single map operation and
//! never across an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::connection::{Connection, ConnectionId};

/// Thread-safe set of live connection handles keyed by [`ConnectionId`].
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<dyn Connection>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `connection`.
    ///
    /// Returns `false` (and keeps the existing handle) if a connection with the
    /// same id is already present.
    pub fn add(&self, connection: Arc<dyn Connection>) -> bool {
        let id = connection.id();
        let mut connections = self.lock();
        if connections.contains_key(&id) {
            return false;
        }
        connections.insert(id, connection);
        true
    }

    /// Removes the connection with `id`.
    ///
    /// Returns `false` if it was not present.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// `true` if a connection with `id` is currently open.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` when no connection is open.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns a copy of the live handles.
    ///
    /// The copy is taken under the lock, so callers may iterate it (and call
    /// back into the registry) without risk of deadlock.
    pub fn snapshot(&self) -> Vec<Arc<dyn Connection>> {
        self.lock().values().cloned().collect()
    }

    // A panic inside a command handler must not take the registry down with it.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Arc<dyn Connection>>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<ConnectionId> = self.lock().keys().copied().collect();
        f.debug_struct("ConnectionRegistry")
            .field("connections", &ids)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
