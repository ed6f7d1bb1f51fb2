//! Connection registry and group directory
//!
//! One [`Directory`] holds all shared mutable state: the live-connection
//! set, the connection → display name registry, and the group directory.
//! Workers never touch the containers directly.
//!
//! ```text
//!                          Arc<Directory>
//!                  ┌──────────────────────────────┐
//!                  │ RwLock<                      │
//!                  │   live: id -> ConnectionEntry│
//!                  │   registered: [id, ...]      │
//!                  │   groups: name -> Group      │
//!                  │ >                            │
//!                  └──────────────┬───────────────┘
//!                                 │
//!        ┌────────────────────────┼────────────────────────┐
//!        ▼                        ▼                        ▼
//!    [worker 1]               [worker 2]               [worker 3]
//!    resolve("Bob") ──► Outbound::try_send() ──► writer task ──► TCP
//! ```
//!
//! Registry changes queue `CLIENTLIST` to every live connection while the
//! write lock is held, so every client observes changes in the same order.

pub mod entry;
pub mod error;
pub mod store;

pub use entry::{ConnectionEntry, ConnectionId, Group, GroupCreated, Recipient};
pub use error::RegistryError;
pub use store::{Directory, RegistryChange};
