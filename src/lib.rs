//! chat-relay: a line-protocol chat relay over TCP
//!
//! Clients connect, send their display name as the first line, and then
//! exchange header lines (optionally followed by a binary body) that the
//! relay routes to everyone, to one client, or to a named group.
//!
//! ```no_run
//! use chat_relay::{RelayServer, ServerConfig};
//!
//! # async fn run() -> chat_relay::Result<()> {
//! let config = ServerConfig::default().unique_names(true);
//! let mut server = RelayServer::new(config);
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fanout;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{ConnectionId, Directory};
pub use server::{
    ListenerState, LogEvent, LogLevel, NoopObserver, RelayObserver, RelayServer, ServerConfig,
};
pub use stats::ServerStats;
