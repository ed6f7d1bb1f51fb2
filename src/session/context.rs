//! Session context
//!
//! Identity of one connection as seen by its worker and by observer
//! callbacks.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::registry::ConnectionId;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// TCP connected, waiting for the display name
    Handshaking,
    /// Display name registered, dispatching frames
    Active,
    /// Worker has exited
    Closed,
}

/// Per-connection context
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: ConnectionId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Display name (set by the handshake)
    pub name: Option<String>,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,
}

impl SessionContext {
    /// Create a context for a freshly accepted connection
    pub fn new(session_id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
            name: None,
            phase: SessionPhase::Handshaking,
            connected_at: Instant::now(),
        }
    }

    /// Record the display name and move to `Active`
    pub fn complete_handshake(&mut self, name: String) {
        if self.phase == SessionPhase::Handshaking {
            self.name = Some(name);
            self.phase = SessionPhase::Active;
        }
    }

    /// Mark the session closed
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    /// Display name, or an empty string before the handshake
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Time since the connection was accepted
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
