//! Statistics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared by every connection worker
#[derive(Debug)]
pub struct RelayMetrics {
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
    frames_received: AtomicU64,
    frames_relayed: AtomicU64,
    frames_dropped: AtomicU64,
    malformed_frames: AtomicU64,
    transfers_completed: AtomicU64,
    transfers_failed: AtomicU64,
    bytes_relayed: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            frames_relayed: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            transfers_completed: AtomicU64::new(0),
            transfers_failed: AtomicU64::new(0),
            bytes_relayed: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Saturating: a stop() racing a worker exit must not wrap
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one frame queued for one recipient
    pub fn frame_relayed(&self, bytes: usize) {
        self.frames_relayed.fetch_add(1, Ordering::Relaxed);
        self.bytes_relayed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record one frame dropped for one recipient
    pub fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_completed(&self) {
        self.transfers_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_failed(&self) {
        self.transfers_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            registered_clients: 0,
            groups: 0,
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_relayed: self.frames_relayed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            transfers_completed: self.transfers_completed.load(Ordering::Relaxed),
            transfers_failed: self.transfers_failed.load(Ordering::Relaxed),
            bytes_relayed: self.bytes_relayed.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever accepted
    pub total_connections: u64,
    /// Current live connections
    pub active_connections: u64,
    /// Connections refused by the connection limit
    pub rejected_connections: u64,
    /// Connections that completed the handshake
    pub registered_clients: usize,
    /// Groups created so far
    pub groups: usize,
    /// Header frames received from clients
    pub frames_received: u64,
    /// Frames queued to recipients (one per recipient)
    pub frames_relayed: u64,
    /// Frames dropped because a recipient's queue was full or closed
    pub frames_dropped: u64,
    /// Malformed header frames discarded
    pub malformed_frames: u64,
    /// Binary transfers fully received
    pub transfers_completed: u64,
    /// Binary transfers aborted or discarded
    pub transfers_failed: u64,
    /// Bytes queued to recipients
    pub bytes_relayed: u64,
    /// Time since the metrics were created
    pub uptime: Duration,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_stats_new() {
        let stats = ServerStats::new();
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.frames_relayed, 0);
        assert_eq!(stats.frames_dropped, 0);
        assert_eq!(stats.bytes_relayed, 0);
    }

    #[test]
    fn test_connection_counters() {
        let metrics = RelayMetrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();

        let stats = metrics.snapshot();
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.active_connections, 1);
    }

    #[test]
    fn test_active_connections_saturate() {
        let metrics = RelayMetrics::new();
        metrics.connection_closed();

        assert_eq!(metrics.snapshot().active_connections, 0);
    }

    #[test]
    fn test_relay_counters() {
        let metrics = RelayMetrics::new();
        metrics.frame_relayed(10);
        metrics.frame_relayed(5);
        metrics.frame_dropped();
        metrics.transfer_completed();
        metrics.transfer_failed();
        metrics.malformed_frame();

        let stats = metrics.snapshot();
        assert_eq!(stats.frames_relayed, 2);
        assert_eq!(stats.bytes_relayed, 15);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.transfers_completed, 1);
        assert_eq!(stats.transfers_failed, 1);
        assert_eq!(stats.malformed_frames, 1);
    }
}
