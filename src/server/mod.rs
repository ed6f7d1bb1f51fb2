//! Relay server
//!
//! ```text
//!                      ┌──────────────┐
//!   TCP accept ──────▶ │   Acceptor   │── limit reached ──▶ close
//!                      └──────┬───────┘
//!                             │ spawn per connection
//!               ┌─────────────┴─────────────┐
//!               ▼                           ▼
//!        ┌─────────────┐             ┌─────────────┐
//!        │ Connection  │             │   Writer    │◀── Outbound queue
//!        │ (reader)    │             │ (socket tx) │
//!        └──────┬──────┘             └─────────────┘
//!               │ ClientFrame
//!               ▼
//!        ┌─────────────┐   resolve   ┌─────────────┐
//!        │ Dispatcher  │────────────▶│  Directory  │
//!        └─────────────┘             └─────────────┘
//! ```

pub mod config;
mod connection;
mod dispatch;
pub mod listener;
pub mod observer;
mod transfer;

pub use config::ServerConfig;
pub use listener::RelayServer;
pub use observer::{ListenerState, LogEvent, LogLevel, NoopObserver, RelayObserver};
