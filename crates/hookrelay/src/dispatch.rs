//! Dispatch event handling.
//!
//! The dispatcher interprets `DISPATCH` envelopes by event name. Only two
//! events matter to the relay: `READY` is logged, and `MESSAGE_CREATE` from a
//! non-bot author is forwarded. A dispatch that fails its schema is logged and
//! dropped; it never reaches back into the receive loop.

use std::sync::Arc;
use std::time::Duration;

use hookrelay_proto::DispatchEvent;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::forward::Forwarder;

/// What the dispatcher did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Session ready; the logged-in user.
    Ready {
        /// Username of the session user.
        username: String,
    },
    /// A message was handed to the forwarder.
    Forwarded,
    /// A message from a bot author was dropped.
    SkippedBot,
    /// The event is not one the relay acts on.
    Ignored,
    /// The payload did not match its schema.
    Malformed,
}

/// Routes dispatch events and runs forwards without blocking the caller.
pub struct EventDispatcher<F> {
    forwarder: Arc<F>,
    in_flight: JoinSet<()>,
    forwarded: u64,
}

impl<F: Forwarder> EventDispatcher<F> {
    /// Create a dispatcher around a forwarder.
    pub fn new(forwarder: F) -> Self {
        Self {
            forwarder: Arc::new(forwarder),
            in_flight: JoinSet::new(),
            forwarded: 0,
        }
    }

    /// Handle one dispatch.
    ///
    /// Forwarding is spawned, so this returns as soon as the event has been
    /// classified.
    pub fn dispatch(&mut self, event: &str, payload: Value) -> DispatchOutcome {
        self.reap();

        match DispatchEvent::parse(event, &payload) {
            Ok(DispatchEvent::Ready(ready)) => {
                info!(
                    username = %ready.user.username,
                    session_id = ready.session_id.as_deref().unwrap_or("-"),
                    "logged in as {}",
                    ready.user.username
                );
                DispatchOutcome::Ready {
                    username: ready.user.username,
                }
            }
            Ok(DispatchEvent::MessageCreate(message)) if message.author.bot => {
                debug!(author = %message.author.username, "skipping bot message");
                DispatchOutcome::SkippedBot
            }
            Ok(DispatchEvent::MessageCreate(message)) => {
                info!(
                    author = %message.author.username,
                    content = %message.content,
                    "message received"
                );
                self.forward(payload);
                DispatchOutcome::Forwarded
            }
            Ok(DispatchEvent::Other(name)) => {
                debug!(event = %name, "ignoring dispatch");
                DispatchOutcome::Ignored
            }
            Err(e) => {
                warn!(event, error = %e, "skipping malformed dispatch");
                DispatchOutcome::Malformed
            }
        }
    }

    /// Number of payloads handed to the forwarder.
    #[must_use]
    pub const fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Number of forwards still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait up to `grace` for running forwards, then abort the rest.
    pub async fn shutdown(&mut self, grace: Duration) {
        let drained = tokio::time::timeout(grace, async {
            while let Some(result) = self.in_flight.join_next().await {
                log_join(result);
            }
        })
        .await;

        if drained.is_err() {
            warn!(remaining = self.in_flight.len(), "aborting in-flight forwards");
            self.in_flight.shutdown().await;
        }
    }

    fn forward(&mut self, payload: Value) {
        self.forwarded += 1;
        let forwarder = Arc::clone(&self.forwarder);
        self.in_flight.spawn(async move {
            match forwarder.forward(payload).await {
                Ok(status) => info!(status, "forwarded message to webhook"),
                Err(e) => warn!(error = %e, "failed to forward message"),
            }
        });
    }

    fn reap(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            log_join(result);
        }
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "forward task panicked");
        }
    }
}
