//! Dispatch event schemas.
//!
//! Only the fields this client reads are modelled. Everything else in a
//! payload is ignored on decode and still reaches the forwarder untouched,
//! because forwarding uses the raw payload rather than these types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtoError;

/// Event name of the session-ready dispatch.
pub const READY: &str = "READY";
/// Event name of the message-created dispatch.
pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";

/// A user object, reduced to what the client logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Display name.
    pub username: String,
}

/// Payload of a `READY` dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ready {
    /// The user this session is logged in as.
    pub user: User,
    /// Session identifier, kept for diagnostics.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Author of a created message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    /// Display name.
    pub username: String,
    /// Whether the author is a bot account. The gateway omits the key for
    /// regular users.
    #[serde(default)]
    pub bot: bool,
}

/// Payload of a `MESSAGE_CREATE` dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCreate {
    /// Message author.
    pub author: MessageAuthor,
    /// Message text. Empty when the session lacks the message content intent.
    #[serde(default)]
    pub content: String,
}

/// A dispatch decoded by event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Session is ready.
    Ready(Ready),
    /// A message was posted.
    MessageCreate(MessageCreate),
    /// Any event this client does not act on.
    Other(String),
}

impl DispatchEvent {
    /// Decode a dispatch payload according to its event name.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::MalformedPayload`] when a known event's payload
    /// does not match its schema.
    pub fn parse(event: &str, payload: &Value) -> Result<Self, ProtoError> {
        match event {
            READY => decode(event, payload).map(Self::Ready),
            MESSAGE_CREATE => decode(event, payload).map(Self::MessageCreate),
            other => Ok(Self::Other(other.to_string())),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(event: &str, payload: &Value) -> Result<T, ProtoError> {
    T::deserialize(payload).map_err(|e| ProtoError::MalformedPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}
