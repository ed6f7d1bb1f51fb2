//! Connection and group entries
//!
//! This module defines the per-connection and per-group state stored in the
//! directory.

use std::net::SocketAddr;
use std::time::Instant;

use crate::session::Outbound;

/// Identifier of one accepted connection (monotonic per server)
pub type ConnectionId = u64;

/// Entry for a single live connection
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    /// Session ID assigned at accept time
    pub id: ConnectionId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Display name (None until the handshake completes)
    pub name: Option<String>,

    /// Handle to the connection's outbound queue
    pub outbound: Outbound,

    /// When the connection was accepted
    pub connected_at: Instant,
}

impl ConnectionEntry {
    pub fn new(id: ConnectionId, peer_addr: SocketAddr, outbound: Outbound) -> Self {
        Self {
            id,
            peer_addr,
            name: None,
            outbound,
            connected_at: Instant::now(),
        }
    }
}

/// A named group with membership fixed at creation
///
/// Members that disconnect are pruned; nobody is ever added afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Group name
    pub name: String,

    /// Connection that created the group
    pub creator: ConnectionId,

    /// Members in creation order (creator first)
    pub members: Vec<ConnectionId>,
}

impl Group {
    pub(super) fn new(name: String, creator: ConnectionId, members: Vec<ConnectionId>) -> Self {
        Self {
            name,
            creator,
            members,
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains(&id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Drop a departed member; returns whether it was present
    pub(super) fn prune(&mut self, id: ConnectionId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| *member != id);
        self.members.len() != before
    }
}

/// A registered connection resolved by name
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: ConnectionId,
    pub name: String,
    pub outbound: Outbound,
}

/// Result of a successful group creation
#[derive(Debug, Clone)]
pub struct GroupCreated {
    /// The new group
    pub group: Group,

    /// Final members with their names, creator first
    pub members: Vec<Recipient>,

    /// Requested member names that did not resolve
    pub unresolved: Vec<String>,
}

impl GroupCreated {
    /// Final member names in membership order
    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }
}
