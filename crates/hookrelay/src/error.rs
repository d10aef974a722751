//! Error types for hookrelay.

use hookrelay_proto::ProtoError;
use thiserror::Error;

/// Errors that can occur while relaying gateway events.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket-level failure: connect, read, write or close.
    #[error("gateway transport error: {0}")]
    Transport(String),

    /// The gateway broke the expected frame sequence.
    #[error("gateway protocol error: {0}")]
    Protocol(String),

    /// The downstream webhook call failed or returned a non-success status.
    #[error("forwarding failed: {0}")]
    Forwarding(String),

    /// Encoding or decoding a frame failed.
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),
}

impl RelayError {
    /// Whether this error ends the session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Transport(_) | Self::Protocol(_))
    }
}
