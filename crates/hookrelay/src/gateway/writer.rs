//! Serialized write path onto the gateway socket.

use std::sync::Arc;

use futures::{Sink, SinkExt};
use hookrelay_proto::Envelope;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::RelayError;

/// Cloneable handle that writes whole frames onto one transport.
///
/// Every clone shares the same sink behind an async mutex, so a frame from one
/// writer is fully written before a frame from another begins.
pub struct FrameWriter<S> {
    sink: Arc<Mutex<S>>,
}

impl<S> Clone for FrameWriter<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<S> FrameWriter<S>
where
    S: Sink<Message, Error = WsError> + Unpin + Send + 'static,
{
    /// Wrap the write half of a transport.
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Encode and send one envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the transport rejects the write.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), RelayError> {
        let text = envelope.encode()?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| RelayError::Transport(format!("failed to send {}: {e}", envelope.op)))
    }

    /// Close the transport. Only the owning connection calls this.
    pub(crate) async fn close(&self) -> Result<(), RelayError> {
        let mut sink = self.sink.lock().await;
        sink.close()
            .await
            .map_err(|e| RelayError::Transport(format!("failed to close: {e}")))
    }
}
