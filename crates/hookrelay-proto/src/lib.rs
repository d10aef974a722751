//! # hookrelay-proto
//!
//! Protocol definitions for the gateway connection: the JSON envelope that
//! carries every frame, the opcodes that drive the handshake, and typed
//! schemas for the payloads the client reads or writes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod events;
pub mod opcode;
pub mod payload;

pub use envelope::Envelope;
pub use error::ProtoError;
pub use events::{DispatchEvent, MessageAuthor, MessageCreate, Ready, User};
pub use opcode::OpCode;
pub use payload::{intents, ConnectionProperties, Hello, Identify};
