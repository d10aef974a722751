//! Heartbeat/keepalive mechanism.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::Sink;
use hookrelay_proto::Envelope;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::sequence::SequenceTracker;
use super::writer::FrameWriter;
use crate::error::RelayError;

/// Handle for controlling the heartbeat task.
///
/// Dropping the handle cancels the task; [`HeartbeatHandle::stop`] also waits
/// for it to finish.
#[derive(Debug)]
pub struct HeartbeatHandle {
    interval: Duration,
    cancel: CancellationToken,
    beats_sent: Arc<AtomicU64>,
    task: Option<JoinHandle<Result<(), RelayError>>>,
}

impl HeartbeatHandle {
    /// Cadence the task was started with.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of heartbeat frames written so far.
    #[must_use]
    pub fn beats_sent(&self) -> u64 {
        self.beats_sent.load(Ordering::SeqCst)
    }

    /// Check if the heartbeat task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait for the task to end on its own, which only happens when a write
    /// fails. Pending forever once the task has been observed to finish.
    pub async fn wait(&mut self) -> Result<(), RelayError> {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };
        let result = task.await;
        self.task = None;
        flatten(result)
    }

    /// Cancel the task and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns the write error if the task had already failed.
    pub async fn stop(mut self) -> Result<(), RelayError> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => flatten(task.await),
            None => Ok(()),
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn flatten(result: Result<Result<(), RelayError>, JoinError>) -> Result<(), RelayError> {
    match result {
        Ok(inner) => inner,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(RelayError::Transport(format!("heartbeat task failed: {e}"))),
    }
}

/// Start a periodic heartbeat task.
///
/// The first heartbeat goes out one `interval` from now. Each frame carries
/// the last dispatch sequence seen on the session, or `null` before the
/// first dispatch.
pub fn start_heartbeat_task<S>(
    writer: FrameWriter<S>,
    interval: Duration,
    sequence: Arc<SequenceTracker>,
) -> HeartbeatHandle
where
    S: Sink<Message, Error = WsError> + Unpin + Send + 'static,
{
    let cancel = CancellationToken::new();
    let beats_sent = Arc::new(AtomicU64::new(0));

    let task = tokio::spawn(heartbeat_loop(
        writer,
        Instant::now() + interval,
        interval,
        sequence,
        cancel.clone(),
        Arc::clone(&beats_sent),
    ));

    HeartbeatHandle {
        interval,
        cancel,
        beats_sent,
        task: Some(task),
    }
}

async fn heartbeat_loop<S>(
    writer: FrameWriter<S>,
    first_beat: Instant,
    interval: Duration,
    sequence: Arc<SequenceTracker>,
    cancel: CancellationToken,
    beats_sent: Arc<AtomicU64>,
) -> Result<(), RelayError>
where
    S: Sink<Message, Error = WsError> + Unpin + Send + 'static,
{
    let mut ticker = interval_at(first_beat, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("heartbeat cancelled");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let last_sequence = sequence.last();
        let envelope = Envelope::heartbeat(last_sequence);
        // A stalled transport must not hold up cancellation.
        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("heartbeat cancelled during write");
                return Ok(());
            }
            sent = writer.send(&envelope) => sent,
        };
        if let Err(e) = sent {
            warn!(error = %e, "heartbeat write failed");
            return Err(e);
        }

        let count = beats_sent.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(count, ?last_sequence, "heartbeat sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::{SinkExt, StreamExt};
    use hookrelay_proto::OpCode;
    use serde_json::Value;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    type TestSink = futures::sink::SinkMapErr<
        mpsc::UnboundedSender<Message>,
        fn(mpsc::SendError) -> WsError,
    >;

    fn closed(_: mpsc::SendError) -> WsError {
        WsError::ConnectionClosed
    }

    fn test_writer() -> (FrameWriter<TestSink>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded();
        let sink: TestSink = tx.sink_map_err(closed as fn(mpsc::SendError) -> WsError);
        (FrameWriter::new(sink), rx)
    }

    fn decode(msg: Message) -> Envelope {
        match msg {
            Message::Text(text) => Envelope::decode(text.as_str()).expect("valid envelope"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_heartbeat_after_one_interval() {
        let (writer, mut rx) = test_writer();
        let interval = Duration::from_millis(45_000);
        let started = Instant::now();

        let handle = start_heartbeat_task(writer, interval, Arc::new(SequenceTracker::new()));
        assert_eq!(handle.interval(), interval);

        let frame = decode(rx.next().await.expect("heartbeat"));
        assert_eq!(frame.op, OpCode::Heartbeat);
        assert_eq!(frame.d, Value::Null);
        assert_eq!(started.elapsed(), interval);

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_follow_cadence() {
        let (writer, mut rx) = test_writer();
        let interval = Duration::from_millis(1_000);
        let started = Instant::now();

        let handle = start_heartbeat_task(writer, interval, Arc::new(SequenceTracker::new()));

        for n in 1..=3u32 {
            let _ = rx.next().await.expect("heartbeat");
            assert_eq!(started.elapsed(), interval * n);
        }
        assert_eq!(handle.beats_sent(), 3);

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_carries_last_sequence() {
        let (writer, mut rx) = test_writer();
        let sequence = Arc::new(SequenceTracker::new());
        sequence.observe(42);

        let handle =
            start_heartbeat_task(writer, Duration::from_millis(500), Arc::clone(&sequence));

        let frame = decode(rx.next().await.expect("heartbeat"));
        assert_eq!(frame.d, Value::from(42));

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_heartbeats() {
        let (writer, mut rx) = test_writer();
        let interval = Duration::from_millis(100);

        let handle = start_heartbeat_task(writer, interval, Arc::new(SequenceTracker::new()));
        let _ = rx.next().await.expect("heartbeat");

        handle.stop().await.unwrap();
        tokio::time::sleep(interval * 3).await;

        // The task dropped its writer, so the channel is closed and empty.
        assert!(matches!(rx.try_next(), Ok(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick_sends_nothing() {
        let (writer, mut rx) = test_writer();
        let handle = start_heartbeat_task(
            writer,
            Duration::from_secs(30),
            Arc::new(SequenceTracker::new()),
        );
        assert!(handle.is_running());

        handle.stop().await.unwrap();
        assert!(matches!(rx.try_next(), Ok(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_task() {
        let (writer, mut rx) = test_writer();
        let handle = start_heartbeat_task(
            writer,
            Duration::from_millis(100),
            Arc::new(SequenceTracker::new()),
        );
        drop(handle);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(matches!(rx.try_next(), Ok(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_is_surfaced() {
        let (writer, rx) = test_writer();
        drop(rx);

        let mut handle = start_heartbeat_task(
            writer,
            Duration::from_millis(100),
            Arc::new(SequenceTracker::new()),
        );

        let err = handle.wait().await.unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)));
        assert!(!handle.is_running());
        assert_eq!(handle.beats_sent(), 0);

        // Already observed; stopping again is clean.
        handle.stop().await.unwrap();
    }

    /// Sink that never becomes ready, like a peer that stopped reading.
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = WsError;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _: Message) -> Result<(), WsError> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Pending
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_returns_while_write_is_stalled() {
        let handle = start_heartbeat_task(
            FrameWriter::new(StalledSink),
            Duration::from_millis(10),
            Arc::new(SequenceTracker::new()),
        );

        // Let the first beat start and block on the transport.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_running());
        assert_eq!(handle.beats_sent(), 0);

        let stopped = tokio::time::timeout(Duration::from_secs(2), handle.stop()).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_writes_share_the_transport_with_other_writers() {
        let (writer, mut rx) = test_writer();
        let handle = start_heartbeat_task(
            writer.clone(),
            Duration::from_millis(5),
            Arc::new(SequenceTracker::new()),
        );

        writer.send(&Envelope::bare(OpCode::HeartbeatAck)).await.unwrap();

        let mut saw_other = false;
        let mut saw_heartbeat = false;
        while !(saw_other && saw_heartbeat) {
            match decode(rx.next().await.expect("frame")).op {
                OpCode::Heartbeat => saw_heartbeat = true,
                OpCode::HeartbeatAck => saw_other = true,
                other => panic!("unexpected {other:?}"),
            }
        }

        handle.stop().await.unwrap();
    }
}
