//! WebSocket connection abstraction

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Progress of a charge point connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// WebSocket open, no BootNotification accepted yet
    Connected,
    /// BootNotification accepted
    Ready,
}

/// Represents an active WebSocket connection to a charge point
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection instance
    pub connection_id: u64,
    pub charge_point_id: String,
    /// Channel to send messages to the charge point
    pub sender: mpsc::UnboundedSender<String>,
    pub status: ConnectionStatus,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        connection_id: u64,
        charge_point_id: impl Into<String>,
        sender: mpsc::UnboundedSender<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            connection_id,
            charge_point_id: charge_point_id.into(),
            sender,
            status: ConnectionStatus::Connected,
            connected_at: now,
            last_activity: now,
        }
    }

    /// Send a message to the charge point
    pub fn send(&self, message: String) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|e| format!("Failed to send message: {}", e))
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn is_ready(&self) -> bool {
        self.status == ConnectionStatus::Ready
    }
}
