//! hookrelay - gateway-to-webhook relay
//!
//! Connects to the Discord gateway as a bot, keeps the session alive with
//! heartbeats, and forwards every message written by a human to an HTTP
//! webhook.

#![forbid(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod forward;
pub mod gateway;

pub use config::{BotToken, ForwardMethod, RelayConfig};
pub use dispatch::{DispatchOutcome, EventDispatcher};
pub use error::RelayError;
pub use forward::{Forwarder, WebhookForwarder};
pub use gateway::{ConnectionState, GatewayConnection};
