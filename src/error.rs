//! Error types
//!
//! Top-level [`Error`] plus the narrower error kinds raised by the wire
//! protocol and the binary transfer path.

use std::fmt;
use std::io;

pub use crate::registry::RegistryError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Underlying socket error
    Io(io::Error),
    /// Wire protocol violation
    Protocol(ProtocolError),
    /// Binary body could not be received
    Transfer(TransferError),
    /// Registry or group directory rejected an operation
    Registry(RegistryError),
    /// Listener is in the wrong state for the requested operation
    InvalidState(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Transfer(e) => write!(f, "Transfer error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::InvalidState(s) => write!(f, "Invalid state: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Transfer(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::InvalidState(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        Error::Transfer(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

/// Errors raised while parsing header lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Recognized prefix but not enough pipe-delimited fields
    MissingFields {
        prefix: &'static str,
        expected: usize,
        found: usize,
    },
    /// Declared body length is not a non-negative integer
    InvalidLength(String),
    /// Header line exceeded the configured maximum
    HeaderTooLong(usize),
    /// Handshake line was empty after trimming
    EmptyName,
    /// Handshake name is already registered (unique-name mode)
    NameTaken(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MissingFields {
                prefix,
                expected,
                found,
            } => write!(
                f,
                "Malformed {} header: expected {} fields, found {}",
                prefix, expected, found
            ),
            ProtocolError::InvalidLength(s) => write!(f, "Invalid byte length: {:?}", s),
            ProtocolError::HeaderTooLong(max) => {
                write!(f, "Header line exceeds {} bytes", max)
            }
            ProtocolError::EmptyName => write!(f, "Empty display name"),
            ProtocolError::NameTaken(name) => write!(f, "Display name already in use: {}", name),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Errors raised while receiving a declared-length body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Stream closed before the declared length was read
    Truncated { expected: u64, received: u64 },
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Truncated { expected, received } => write!(
                f,
                "Connection closed during transfer ({} of {} bytes)",
                received, expected
            ),
        }
    }
}

impl std::error::Error for TransferError {}
