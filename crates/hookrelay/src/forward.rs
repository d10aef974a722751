//! Delivery of message payloads to the downstream webhook.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::config::{ForwardMethod, RelayConfig};
use crate::error::RelayError;

/// Destination for forwarded dispatch payloads.
///
/// Implementations report the HTTP status on success. Any failure is
/// reported as [`RelayError::Forwarding`]; callers log it and move on.
pub trait Forwarder: Send + Sync + 'static {
    /// Deliver one payload.
    fn forward(&self, payload: Value) -> impl Future<Output = Result<u16, RelayError>> + Send;
}

/// Forwards payloads as JSON bodies to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookForwarder {
    client: reqwest::Client,
    url: Url,
    method: ForwardMethod,
}

impl WebhookForwarder {
    /// Create a forwarder for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, method: ForwardMethod, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hookrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url,
            method,
        })
    }

    /// Create a forwarder from relay configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        Self::new(
            config.webhook_url.clone(),
            config.forward_method,
            config.forward_timeout,
        )
    }

    /// The configured HTTP method.
    #[must_use]
    pub const fn method(&self) -> ForwardMethod {
        self.method
    }
}

impl Forwarder for WebhookForwarder {
    async fn forward(&self, payload: Value) -> Result<u16, RelayError> {
        let request = match self.method {
            ForwardMethod::Get => self.client.get(self.url.clone()),
            ForwardMethod::Post => self.client.post(self.url.clone()),
        };

        let response = request
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::Forwarding(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(RelayError::Forwarding(format!("webhook returned {status}")))
        }
    }
}
