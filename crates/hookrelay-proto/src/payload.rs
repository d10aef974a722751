//! Handshake payload schemas.

use serde::{Deserialize, Serialize};

/// Gateway intent bits.
///
/// Intents select which event categories the gateway delivers to this
/// session.
pub mod intents {
    /// Guild create/update/delete and channel events.
    pub const GUILDS: u64 = 1 << 0;
    /// Messages posted in guild channels.
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    /// Intents requested when none are configured.
    pub const DEFAULT: u64 = GUILDS | GUILD_MESSAGES;
}

/// Payload of a HELLO frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Heartbeat cadence in milliseconds.
    pub heartbeat_interval: u64,
}

/// Client identification metadata sent with IDENTIFY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Operating system.
    pub os: String,
    /// Library name.
    pub browser: String,
    /// Library name.
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "hookrelay".to_string(),
            device: "hookrelay".to_string(),
        }
    }
}

/// Payload of an IDENTIFY frame.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identify {
    /// Bot token.
    pub token: String,
    /// Intent bitmask.
    pub intents: u64,
    /// Client identification.
    pub properties: ConnectionProperties,
}

impl Identify {
    /// Create an identify payload.
    #[must_use]
    pub fn new(token: impl Into<String>, intents: u64, properties: ConnectionProperties) -> Self {
        Self {
            token: token.into(),
            intents,
            properties,
        }
    }
}

// The token must never reach a log line.
impl std::fmt::Debug for Identify {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identify")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("properties", &self.properties)
            .finish()
    }
}
