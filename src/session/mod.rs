//! Per-connection session state
//!
//! - [`SessionContext`]: identity and phase of one connection
//! - [`Outbound`]: bounded outbound queue feeding the connection's writer task

pub mod context;
pub mod outbound;

pub use context::{SessionContext, SessionPhase};
pub use outbound::{EnqueueError, Outbound};
