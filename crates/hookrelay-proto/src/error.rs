//! Error types for the hookrelay-proto crate.

use thiserror::Error;

use crate::opcode::OpCode;

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Failed to encode a frame.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Failed to decode a frame.
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// A frame arrived with an opcode the current step does not accept.
    #[error("unexpected opcode: expected {expected:?}, got {actual:?}")]
    UnexpectedOpcode {
        /// Opcode the protocol step requires.
        expected: OpCode,
        /// Opcode that was received.
        actual: OpCode,
    },

    /// A dispatch payload did not match the schema for its event.
    #[error("malformed {event} payload: {reason}")]
    MalformedPayload {
        /// Event name the payload arrived with.
        event: String,
        /// What was wrong with it.
        reason: String,
    },
}
