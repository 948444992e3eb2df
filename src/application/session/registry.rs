//! Session registry: tracks live charge point WebSocket connections

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::{Connection, ConnectionStatus};

/// Thread-safe registry of active OCPP charge point sessions
pub struct SessionRegistry {
    sessions: DashMap<String, Connection>,
    next_connection_id: AtomicU64,
}

/// Shared, reference-counted session registry
pub type SharedSessionRegistry = Arc<SessionRegistry>;

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn shared() -> SharedSessionRegistry {
        Arc::new(Self::new())
    }

    /// Register a connection, replacing any previous one for the same id.
    ///
    /// Returns the connection id to pass back to [`Self::unregister`].
    pub fn register(&self, charge_point_id: &str, sender: mpsc::UnboundedSender<String>) -> u64 {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::SeqCst);
        let connection = Connection::new(connection_id, charge_point_id, sender);

        if let Some(previous) = self
            .sessions
            .insert(charge_point_id.to_string(), connection)
        {
            warn!(
                charge_point_id,
                evicted_connection_id = previous.connection_id,
                "Replaced existing charge point session"
            );
        }
        info!(charge_point_id, connection_id, "Registered charge point session");
        connection_id
    }

    /// Unregister a connection. Ignored if a newer connection took its place.
    pub fn unregister(&self, charge_point_id: &str, connection_id: u64) -> bool {
        let removed = self
            .sessions
            .remove_if(charge_point_id, |_, conn| conn.connection_id == connection_id)
            .is_some();

        if removed {
            info!(charge_point_id, connection_id, "Unregistered charge point session");
        } else {
            debug!(
                charge_point_id,
                connection_id, "Session already replaced or gone, nothing to unregister"
            );
        }
        removed
    }

    /// Mark a charge point as ready (BootNotification accepted)
    pub fn mark_ready(&self, charge_point_id: &str) -> bool {
        match self.sessions.get_mut(charge_point_id) {
            Some(mut conn) => {
                conn.status = ConnectionStatus::Ready;
                true
            }
            None => false,
        }
    }

    /// Send a message to a specific charge point
    pub fn send_to(&self, charge_point_id: &str, message: String) -> Result<(), String> {
        match self.sessions.get(charge_point_id) {
            Some(conn) => conn.send(message),
            None => Err(format!("Charge point {} not connected", charge_point_id)),
        }
    }

    /// Update last activity for a charge point
    pub fn touch(&self, charge_point_id: &str) {
        if let Some(mut conn) = self.sessions.get_mut(charge_point_id) {
            conn.touch();
        }
    }

    pub fn is_connected(&self, charge_point_id: &str) -> bool {
        self.sessions.contains_key(charge_point_id)
    }

    pub fn status(&self, charge_point_id: &str) -> Option<ConnectionStatus> {
        self.sessions.get(charge_point_id).map(|conn| conn.status)
    }

    pub fn is_ready(&self, charge_point_id: &str) -> bool {
        self.status(charge_point_id) == Some(ConnectionStatus::Ready)
    }

    /// Get all connected charge point IDs
    pub fn connected_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of active sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
