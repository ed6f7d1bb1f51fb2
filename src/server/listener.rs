//! Relay server listener
//!
//! Owns the listening socket and the `Stopped → Listening → Stopped`
//! lifecycle. Each accepted connection gets an outbound queue with its own
//! writer task, an entry in the live set, and a reader worker.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{Error, Result};
use crate::registry::{ConnectionEntry, ConnectionId, Directory};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::dispatch::Dispatcher;
use crate::server::observer::{EventSink, ListenerState, NoopObserver, RelayObserver};
use crate::session::outbound::{run_writer, Outbound};
use crate::stats::{RelayMetrics, ServerStats};

/// State shared by the acceptor and every connection worker
pub(crate) struct Shared {
    pub(crate) config: ServerConfig,
    pub(crate) directory: Arc<Directory>,
    pub(crate) metrics: Arc<RelayMetrics>,
    pub(crate) events: EventSink,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

/// Chat relay server
pub struct RelayServer {
    shared: Arc<Shared>,
    next_session_id: Arc<AtomicU64>,
    running: Option<Running>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_observer(config, NoopObserver)
    }

    /// Create a new server reporting to `observer`
    pub fn with_observer<O: RelayObserver>(config: ServerConfig, observer: O) -> Self {
        Self::with_shared_observer(config, Arc::new(observer))
    }

    /// Create a new server reporting to an already shared observer
    pub fn with_shared_observer(config: ServerConfig, observer: Arc<dyn RelayObserver>) -> Self {
        let metrics = Arc::new(RelayMetrics::new());
        let shared = Shared {
            config,
            directory: Arc::new(Directory::with_metrics(Arc::clone(&metrics))),
            metrics,
            events: EventSink::new(observer),
        };

        Self {
            shared: Arc::new(shared),
            next_session_id: Arc::new(AtomicU64::new(1)),
            running: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }

    /// Get a reference to the registry and group directory
    pub fn directory(&self) -> &Arc<Directory> {
        &self.shared.directory
    }

    pub fn state(&self) -> ListenerState {
        if self.running.is_some() {
            ListenerState::Listening
        } else {
            ListenerState::Stopped
        }
    }

    /// Bound address while listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Start listening on the configured bind address
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let addr = self.shared.config.bind_addr;
        self.start_on(addr).await
    }

    /// Start listening on `addr`, e.g. `("127.0.0.1", 5000)`
    ///
    /// Fails if already listening or if the bind fails; in both cases the
    /// listener state is unchanged.
    pub async fn start_on<A: ToSocketAddrs>(&mut self, addr: A) -> Result<SocketAddr> {
        if self.running.is_some() {
            return Err(Error::InvalidState("server is already listening"));
        }

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "Failed to bind listener");
                self.shared
                    .events
                    .error(None, format!("Failed to start server: {}", e));
                return Err(e.into());
            }
        };
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connection_semaphore = if self.shared.config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(self.shared.config.max_connections)))
        } else {
            None
        };

        let acceptor = Acceptor {
            listener,
            shared: Arc::clone(&self.shared),
            next_session_id: Arc::clone(&self.next_session_id),
            connection_semaphore,
        };
        let accept_task = tokio::spawn(acceptor.run(shutdown_rx));

        self.running = Some(Running {
            local_addr,
            shutdown: shutdown_tx,
            accept_task,
        });

        tracing::info!(addr = %local_addr, "Relay server listening");
        self.shared
            .events
            .info(None, format!("Server started on {}", local_addr));
        self.shared.events.state(ListenerState::Listening);

        Ok(local_addr)
    }

    /// Stop listening and close every live connection
    ///
    /// Returns once the accept loop and all connection workers have exited.
    /// A no-op when already stopped.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown.send(true);

        if let Err(e) = running.accept_task.await {
            if e.is_panic() {
                tracing::error!(error = %e, "Accept loop panicked");
                self.shared
                    .events
                    .error(None, format!("Accept loop panicked: {}", e));
            }
        }

        let closed = self.shared.directory.clear().await;
        if !closed.is_empty() {
            tracing::debug!(connections = closed.len(), "Dropped leftover connections");
        }

        tracing::info!("Relay server stopped");
        self.shared.events.info(None, "Server stopped...");
        self.shared.events.state(ListenerState::Stopped);
    }

    /// Start, run until `shutdown` resolves, then stop
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        tracing::info!("Shutdown signal received");
        self.stop().await;
        Ok(())
    }

    /// Current server statistics
    pub async fn stats(&self) -> ServerStats {
        let mut stats = self.shared.metrics.snapshot();
        stats.registered_clients = self.shared.directory.registered_count().await;
        stats.groups = self.shared.directory.group_count().await;
        stats
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            let _ = running.shutdown.send(true);
        }
    }
}

/// Accept loop state, moved into its own task
struct Acceptor {
    listener: TcpListener,
    shared: Arc<Shared>,
    next_session_id: Arc<AtomicU64>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl Acceptor {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut workers = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(_) = workers.join_next(), if !workers.is_empty() => {}
                result = self.listener.accept() => match result {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr, &shutdown, &mut workers)
                            .await;
                    }
                    Err(e) => {
                        if *shutdown.borrow() {
                            break;
                        }
                        tracing::error!(error = %e, "Accept error");
                        self.shared.events.error(None, format!("Error: {}", e));
                    }
                },
            }
        }

        // Closing the socket before waiting on workers refuses new peers
        drop(self.listener);
        while workers.join_next().await.is_some() {}
    }

    async fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        shutdown: &watch::Receiver<bool>,
        workers: &mut JoinSet<()>,
    ) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.shared.metrics.connection_rejected();
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    self.shared.events.warn(
                        None,
                        format!("Connection from {} rejected: limit reached", peer_addr),
                    );
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        if self.shared.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(session_id, peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
                self.shared
                    .events
                    .error(Some(session_id), format!("Failed to configure socket: {}", e));
                return;
            }
        }

        let (read_half, write_half) = socket.into_split();
        let (outbound, queue) = Outbound::channel(session_id, self.shared.config.outbound_capacity);

        self.shared
            .directory
            .add_connection(ConnectionEntry::new(session_id, peer_addr, outbound))
            .await;
        self.shared.metrics.connection_opened();
        tracing::info!(session_id, peer = %peer_addr, "New connection");
        self.shared.events.info(
            Some(session_id),
            format!("New client connected from {}", peer_addr),
        );

        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            match run_writer(session_id, queue, write_half, writer_shutdown).await {
                Ok(bytes) => tracing::debug!(session_id, bytes, "Writer finished"),
                Err(e) => tracing::debug!(session_id, error = %e, "Writer failed"),
            }
        });

        let shared = Arc::clone(&self.shared);
        let worker_shutdown = shutdown.clone();
        workers.spawn(async move {
            let _permit = permit;
            let connection = Connection::new(session_id, peer_addr, read_half, Arc::clone(&shared));
            let result = connection.run(worker_shutdown).await;
            teardown(&shared, session_id, result).await;
        });
    }
}

/// Remove a finished connection and tell everyone who is left
async fn teardown(shared: &Shared, session_id: ConnectionId, result: Result<()>) {
    let (entry, change) = shared.directory.remove_connection(session_id).await;
    shared.metrics.connection_closed();

    if let Some(entry) = &entry {
        tracing::info!(
            session_id,
            peer = %entry.peer_addr,
            name = change.as_ref().map_or("", |c| c.name.as_str()),
            connected_for = ?entry.connected_at.elapsed(),
            "Connection closed"
        );
    }

    if let Err(e) = &result {
        tracing::warn!(session_id, error = %e, "Connection ended with error");
        shared
            .events
            .info(Some(session_id), format!("A client disconnected: {}", e));
    }

    match change {
        Some(change) => {
            shared.events.info(
                Some(session_id),
                format!("Client disconnected: {}", change.name),
            );
            if !change.pruned_groups.is_empty() {
                tracing::debug!(session_id, groups = ?change.pruned_groups, "Pruned from groups");
            }
            shared.events.client_list(&change.names);
            Dispatcher::new(shared, session_id, &change.name).report(&change.delivery);
        }
        None => tracing::debug!(session_id, "Closed before registering"),
    }
}
