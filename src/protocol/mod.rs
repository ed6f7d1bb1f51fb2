//! Wire protocol
//!
//! ```text
//! client                                  server
//!   |--- "Alice\n" (handshake) ------------>|
//!   |<-- "CLIENTLIST|Alice,Bob\n" ----------|
//!   |--- "PRIVATE|Bob|Hi\n" --------------->|--> Bob: "PRIVATE FROM Alice: Hi\n"
//!   |--- "FILE|Bob|a.pdf|2048\n" + body --->|--> Bob: "FILE|Alice|a.pdf|2048\n" + body
//! ```
//!
//! Headers are UTF-8 lines; bodies are raw bytes of exactly the declared
//! length with no terminator.

pub mod codec;
pub mod constants;
pub mod frame;

pub use frame::{ClientFrame, ServerMessage, TransferKind};
