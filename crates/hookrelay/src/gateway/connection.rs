//! One end-to-end gateway session.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, Stream, StreamExt};
use hookrelay_proto::{Envelope, Identify, OpCode};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::heartbeat::{start_heartbeat_task, HeartbeatHandle};
use super::sequence::SequenceTracker;
use super::state::{AtomicConnectionState, ConnectionState};
use super::writer::FrameWriter;
use crate::config::RelayConfig;
use crate::dispatch::EventDispatcher;
use crate::error::RelayError;
use crate::forward::Forwarder;

/// Upper bound on the closing handshake after a clean shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket stream produced by [`GatewayConnection::connect`].
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A message-framed transport the connection can drive.
pub trait GatewayTransport:
    Stream<Item = Result<Message, WsError>>
    + Sink<Message, Error = WsError>
    + Unpin
    + Send
    + 'static
{
}

impl<T> GatewayTransport for T where
    T: Stream<Item = Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Unpin
        + Send
        + 'static
{
}

/// Owns one gateway socket and drives the handshake and event loop on it.
pub struct GatewayConnection<S: GatewayTransport> {
    writer: FrameWriter<SplitSink<S, Message>>,
    reader: SplitStream<S>,
    identify: Identify,
    state: Arc<AtomicConnectionState>,
    sequence: Arc<SequenceTracker>,
    heartbeat_interval: Option<Duration>,
    heartbeat_acks: u64,
}

impl GatewayConnection<WsStream> {
    /// Open the gateway socket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] if the remote is unreachable, the
    /// upgrade fails, or the connect timeout elapses.
    pub async fn connect(config: &RelayConfig) -> Result<Self, RelayError> {
        Self::connect_with_state(config, Arc::new(AtomicConnectionState::default())).await
    }

    /// Like [`GatewayConnection::connect`], reporting progress through a
    /// state cell the caller already holds.
    ///
    /// The cell reads `Connecting` until the upgrade completes, and `Failed`
    /// if it does not.
    ///
    /// # Errors
    ///
    /// Same as [`GatewayConnection::connect`].
    pub async fn connect_with_state(
        config: &RelayConfig,
        state: Arc<AtomicConnectionState>,
    ) -> Result<Self, RelayError> {
        state.store(ConnectionState::Connecting);
        info!(url = %config.gateway_url, "connecting to gateway");

        let connected = timeout(config.connect_timeout, connect_async(config.gateway_url.as_str()))
            .await
            .map_err(|_| RelayError::Transport("connection timeout".to_string()))
            .and_then(|result| {
                result.map_err(|e| RelayError::Transport(format!("failed to connect: {e}")))
            });

        match connected {
            Ok((stream, _response)) => Ok(Self::with_state(stream, config.identify(), state)),
            Err(e) => {
                state.store(ConnectionState::Failed);
                Err(e)
            }
        }
    }
}

impl<S: GatewayTransport> GatewayConnection<S> {
    /// Wrap an already upgraded transport.
    pub fn from_stream(stream: S, identify: Identify) -> Self {
        Self::with_state(stream, identify, Arc::new(AtomicConnectionState::default()))
    }

    fn with_state(stream: S, identify: Identify, state: Arc<AtomicConnectionState>) -> Self {
        let (sink, reader) = stream.split();
        state.store(ConnectionState::AwaitingHello);
        Self {
            writer: FrameWriter::new(sink),
            reader,
            identify,
            state,
            sequence: Arc::new(SequenceTracker::new()),
            heartbeat_interval: None,
            heartbeat_acks: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// Shared state cell, for observers outside the session.
    #[must_use]
    pub fn state_handle(&self) -> Arc<AtomicConnectionState> {
        Arc::clone(&self.state)
    }

    /// Heartbeat interval announced by HELLO, once received.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    /// Heartbeat acknowledgements received so far.
    #[must_use]
    pub const fn heartbeat_acks(&self) -> u64 {
        self.heartbeat_acks
    }

    /// Last dispatch sequence number received.
    #[must_use]
    pub fn last_sequence(&self) -> Option<u64> {
        self.sequence.last()
    }

    /// Run the session until `shutdown` fires or the transport fails.
    ///
    /// Steps: wait for HELLO, start the heartbeat, send IDENTIFY, then hand
    /// every dispatch to `dispatcher`. The heartbeat task is stopped before
    /// this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Protocol`] if the first frame is not a valid
    /// HELLO, and [`RelayError::Transport`] on any read or write failure.
    pub async fn run<F: Forwarder>(
        &mut self,
        dispatcher: &mut EventDispatcher<F>,
        shutdown: &CancellationToken,
    ) -> Result<(), RelayError> {
        let result = self.drive(dispatcher, shutdown).await;

        match &result {
            Ok(()) => {
                self.state.store(ConnectionState::Closed);
                match timeout(CLOSE_TIMEOUT, self.writer.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(error = %e, "close after shutdown failed"),
                    Err(_) => debug!("close after shutdown timed out"),
                }
                info!("gateway session closed");
            }
            Err(e) => {
                self.state.store(ConnectionState::Failed);
                warn!(error = %e, "gateway session failed");
            }
        }

        result
    }

    async fn drive<F: Forwarder>(
        &mut self,
        dispatcher: &mut EventDispatcher<F>,
        shutdown: &CancellationToken,
    ) -> Result<(), RelayError> {
        let hello = tokio::select! {
            biased;
            () = shutdown.cancelled() => return Ok(()),
            frame = next_text(&mut self.reader) => frame?,
        };

        let interval = Self::read_hello(&hello)?;
        self.heartbeat_interval = Some(interval);
        self.state.store(ConnectionState::Identifying);

        let mut heartbeat =
            start_heartbeat_task(self.writer.clone(), interval, Arc::clone(&self.sequence));
        info!(?interval, "received hello, heartbeat started");

        let result = self
            .identify_and_listen(&mut heartbeat, dispatcher, shutdown)
            .await;

        if let Err(e) = heartbeat.stop().await {
            debug!(error = %e, "heartbeat ended with error");
        }
        result
    }

    fn read_hello(text: &str) -> Result<Duration, RelayError> {
        let envelope = Envelope::decode(text)
            .map_err(|e| RelayError::Protocol(format!("first frame is not an envelope: {e}")))?;
        let hello = envelope
            .hello_payload()
            .map_err(|e| RelayError::Protocol(format!("expected HELLO: {e}")))?;
        Ok(Duration::from_millis(hello.heartbeat_interval))
    }

    async fn identify_and_listen<F: Forwarder>(
        &mut self,
        heartbeat: &mut HeartbeatHandle,
        dispatcher: &mut EventDispatcher<F>,
        shutdown: &CancellationToken,
    ) -> Result<(), RelayError> {
        self.writer.send(&Envelope::identify(&self.identify)?).await?;
        self.state.store(ConnectionState::Ready);
        info!(intents = self.identify.intents, "identify sent");

        self.state.store(ConnectionState::EventLoop);
        loop {
            let text = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("shutdown requested");
                    return Ok(());
                }
                result = heartbeat.wait() => {
                    return Err(result.err().unwrap_or_else(|| {
                        RelayError::Transport("heartbeat stopped unexpectedly".to_string())
                    }));
                }
                frame = next_text(&mut self.reader) => frame?,
            };

            self.handle_frame(&text, dispatcher);
        }
    }

    fn handle_frame<F: Forwarder>(&mut self, text: &str, dispatcher: &mut EventDispatcher<F>) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };

        match envelope.op {
            OpCode::Dispatch => {
                if let Some(sequence) = envelope.s {
                    self.sequence.observe(sequence);
                }
                let event = envelope.t.unwrap_or_default();
                let outcome = dispatcher.dispatch(&event, envelope.d);
                debug!(event = %event, ?outcome, "dispatch handled");
            }
            OpCode::HeartbeatAck => {
                self.heartbeat_acks += 1;
                debug!(acks = self.heartbeat_acks, "heartbeat acknowledged");
            }
            OpCode::Reconnect | OpCode::InvalidSession => {
                // Resume and re-identify are not implemented.
                warn!(op = %envelope.op, "gateway requested a new session, ignoring");
            }
            other => {
                debug!(op = %other, "ignoring frame");
            }
        }
    }
}

/// Wait for the next text frame, skipping control frames.
async fn next_text<R>(reader: &mut R) -> Result<String, RelayError>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text),
            Some(Ok(Message::Binary(data))) => {
                debug!(len = data.len(), "ignoring binary frame");
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame.map_or_else(
                    || "no close frame".to_string(),
                    |f| format!("code {}: {}", u16::from(f.code), f.reason),
                );
                return Err(RelayError::Transport(format!(
                    "gateway closed connection ({reason})"
                )));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(RelayError::Transport(format!("read failed: {e}"))),
            None => return Err(RelayError::Transport("connection closed".to_string())),
        }
    }
}
