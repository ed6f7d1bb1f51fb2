//! Registry error types
//!
//! Error types for registry and group directory operations.

use super::entry::ConnectionId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Connection is not in the live set
    UnknownConnection(ConnectionId),
    /// Display name is registered to another connection (unique-name mode)
    NameTaken(String),
    /// A group with this name already exists
    GroupAlreadyExists(String),
    /// Creator has not completed the handshake
    CreatorNotRegistered(ConnectionId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::UnknownConnection(id) => write!(f, "Unknown connection: {}", id),
            RegistryError::NameTaken(name) => write!(f, "Name already in use: {}", name),
            RegistryError::GroupAlreadyExists(name) => {
                write!(f, "Group already exists: {}", name)
            }
            RegistryError::CreatorNotRegistered(id) => {
                write!(f, "Connection {} has no display name", id)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
