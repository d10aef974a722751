//! Gateway WebSocket client.
//!
//! Drives one session against the event gateway: HELLO, heartbeat, IDENTIFY,
//! then the dispatch loop. Reconnect and resume are not handled here; a
//! transport failure ends the session.

mod connection;
mod heartbeat;
mod sequence;
mod state;
mod writer;

// Re-export public types
pub use connection::{GatewayConnection, GatewayTransport, WsStream};
pub use heartbeat::{start_heartbeat_task, HeartbeatHandle};
pub use sequence::SequenceTracker;
pub use state::{AtomicConnectionState, ConnectionState};
pub use writer::FrameWriter;
