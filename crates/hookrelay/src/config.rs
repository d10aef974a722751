//! Relay configuration.
//!
//! Configuration is read once at startup, from the process environment and
//! command-line overrides, and validated before any socket is opened:
//! - Bot token and webhook URL (required)
//! - Gateway URL and intents
//! - Forwarding method and timeouts

use std::str::FromStr;
use std::time::Duration;

use hookrelay_proto::{intents, ConnectionProperties, Identify};
use url::Url;

use crate::error::RelayError;

/// Environment variable holding the bot token.
pub const TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";
/// Environment variable holding the webhook URL.
pub const WEBHOOK_URL_ENV: &str = "N8N_WEBHOOK_URL";
/// Environment variable overriding the gateway URL.
pub const GATEWAY_URL_ENV: &str = "HOOKRELAY_GATEWAY_URL";
/// Environment variable overriding the intent bitmask.
pub const INTENTS_ENV: &str = "HOOKRELAY_INTENTS";
/// Environment variable selecting the forwarding HTTP method.
pub const FORWARD_METHOD_ENV: &str = "HOOKRELAY_FORWARD_METHOD";

/// Gateway endpoint used when none is configured.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// A bot token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken(String);

impl BotToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the identify frame only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BotToken(<redacted>)")
    }
}

/// HTTP method used to deliver payloads to the webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardMethod {
    /// `GET` with a JSON body.
    #[default]
    Get,
    /// `POST` with a JSON body.
    Post,
}

impl FromStr for ForwardMethod {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(RelayError::Config(format!(
                "unsupported forward method '{other}', expected GET or POST"
            ))),
        }
    }
}

impl std::fmt::Display for ForwardMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// Main relay configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Bot token sent in IDENTIFY.
    pub token: BotToken,
    /// Webhook receiving forwarded message payloads.
    pub webhook_url: Url,
    /// Gateway WebSocket URL.
    pub gateway_url: Url,
    /// Intent bitmask.
    pub intents: u64,
    /// Client identification metadata.
    pub properties: ConnectionProperties,
    /// HTTP method for forwarding.
    pub forward_method: ForwardMethod,
    /// Timeout for one webhook call.
    pub forward_timeout: Duration,
    /// Timeout for the WebSocket upgrade.
    pub connect_timeout: Duration,
}

impl RelayConfig {
    /// Create a configuration with defaults for everything but the secrets.
    ///
    /// # Errors
    ///
    /// Returns an error if the default gateway URL fails to parse.
    pub fn new(token: BotToken, webhook_url: Url) -> Result<Self, RelayError> {
        Ok(Self {
            token,
            webhook_url,
            gateway_url: parse_url(GATEWAY_URL_ENV, DEFAULT_GATEWAY_URL)?,
            intents: intents::DEFAULT,
            properties: ConnectionProperties::default(),
            forward_method: ForwardMethod::default(),
            forward_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        })
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or any value is
    /// invalid.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or any value is
    /// invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| RelayError::Config(format!("{key} is not set")))
        };

        let token = BotToken::new(required(TOKEN_ENV)?);
        let webhook_url = parse_url(WEBHOOK_URL_ENV, &required(WEBHOOK_URL_ENV)?)?;
        let mut config = Self::new(token, webhook_url)?;

        if let Some(raw) = lookup(GATEWAY_URL_ENV) {
            config.gateway_url = parse_url(GATEWAY_URL_ENV, &raw)?;
        }
        if let Some(raw) = lookup(INTENTS_ENV) {
            config.intents = raw.trim().parse().map_err(|e| {
                RelayError::Config(format!("{INTENTS_ENV} must be an integer: {e}"))
            })?;
        }
        if let Some(raw) = lookup(FORWARD_METHOD_ENV) {
            config.forward_method = raw.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.token.expose().trim().is_empty() {
            return Err(RelayError::Config("bot token cannot be empty".to_string()));
        }

        if !matches!(self.gateway_url.scheme(), "ws" | "wss") {
            return Err(RelayError::Config(
                "gateway_url must start with ws:// or wss://".to_string(),
            ));
        }

        if !matches!(self.webhook_url.scheme(), "http" | "https") {
            return Err(RelayError::Config(
                "webhook_url must start with http:// or https://".to_string(),
            ));
        }

        if self.intents == 0 {
            return Err(RelayError::Config(
                "intents must select at least one event category".to_string(),
            ));
        }

        if self.forward_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(RelayError::Config("timeouts must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Build the IDENTIFY payload for this configuration.
    #[must_use]
    pub fn identify(&self) -> Identify {
        Identify::new(self.token.expose(), self.intents, self.properties.clone())
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, RelayError> {
    Url::parse(raw.trim()).map_err(|e| RelayError::Config(format!("{key} is not a valid URL: {e}")))
}
