//! Server configuration

use std::net::SocketAddr;

use crate::protocol::constants::*;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Per-connection outbound queue capacity, in frames
    pub outbound_capacity: usize,

    /// Longest accepted header line, in bytes
    pub max_header_len: usize,

    /// Largest declared body that will be relayed
    pub max_transfer_size: u64,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,

    /// Reject a handshake whose name is already registered
    pub unique_names: bool,

    /// Broadcast `GROUPLIST` to everyone after a group is created
    pub announce_groups: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            max_connections: 0, // Unlimited
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_header_len: DEFAULT_MAX_HEADER_LEN,
            max_transfer_size: DEFAULT_MAX_TRANSFER_SIZE,
            tcp_nodelay: true,
            read_buffer_size: 8 * 1024,
            unique_names: false,
            announce_groups: false,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-connection outbound queue capacity (at least 1)
    pub fn outbound_capacity(mut self, frames: usize) -> Self {
        self.outbound_capacity = frames.max(1);
        self
    }

    /// Set the maximum header line length
    pub fn max_header_len(mut self, bytes: usize) -> Self {
        self.max_header_len = bytes;
        self
    }

    /// Set the maximum relayed body size
    pub fn max_transfer_size(mut self, bytes: u64) -> Self {
        self.max_transfer_size = bytes;
        self
    }

    /// Require unique display names
    pub fn unique_names(mut self, unique: bool) -> Self {
        self.unique_names = unique;
        self
    }

    /// Announce the group list on every group creation
    pub fn announce_groups(mut self, announce: bool) -> Self {
        self.announce_groups = announce;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.outbound_capacity, DEFAULT_OUTBOUND_CAPACITY);
        assert_eq!(config.max_header_len, DEFAULT_MAX_HEADER_LEN);
        assert_eq!(config.max_transfer_size, DEFAULT_MAX_TRANSFER_SIZE);
        assert!(config.tcp_nodelay);
        assert!(!config.unique_names);
        assert!(!config.announce_groups);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:5001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 5001);
    }

    #[test]
    fn test_builder_outbound_capacity_floor() {
        let config = ServerConfig::default().outbound_capacity(0);

        assert_eq!(config.outbound_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .outbound_capacity(16)
            .max_header_len(1024)
            .max_transfer_size(4096)
            .unique_names(true)
            .announce_groups(true);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.outbound_capacity, 16);
        assert_eq!(config.max_header_len, 1024);
        assert_eq!(config.max_transfer_size, 4096);
        assert!(config.unique_names);
        assert!(config.announce_groups);
    }
}
