//! Connection state types.

use std::sync::atomic::{AtomicU32, Ordering};

/// Lifecycle of one gateway socket.
///
/// A session moves forward through these states exactly once, except
/// `EventLoop`, which it stays in for every received dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opening the socket. Only observable through a cell passed to
    /// `GatewayConnection::connect_with_state`.
    Connecting,
    /// Socket open, waiting for HELLO.
    AwaitingHello,
    /// HELLO received, heartbeat running, IDENTIFY being sent.
    Identifying,
    /// IDENTIFY sent.
    Ready,
    /// Receiving and dispatching events.
    EventLoop,
    /// Shut down on request.
    Closed,
    /// Ended by a transport or protocol error.
    Failed,
}

impl ConnectionState {
    /// Whether the session has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Atomic wrapper for connection state.
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU32);

impl AtomicConnectionState {
    /// Create a new atomic state.
    #[must_use]
    pub const fn new(state: ConnectionState) -> Self {
        Self(AtomicU32::new(state as u32))
    }

    /// Load the current state.
    #[must_use]
    pub fn load(&self) -> ConnectionState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::AwaitingHello,
            2 => ConnectionState::Identifying,
            3 => ConnectionState::Ready,
            4 => ConnectionState::EventLoop,
            5 => ConnectionState::Closed,
            _ => ConnectionState::Failed,
        }
    }

    /// Store a new state.
    pub fn store(&self, state: ConnectionState) {
        self.0.store(state as u32, Ordering::SeqCst);
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Connecting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_enum() {
        assert_eq!(ConnectionState::Connecting as u32, 0);
        assert_eq!(ConnectionState::AwaitingHello as u32, 1);
        assert_eq!(ConnectionState::Identifying as u32, 2);
        assert_eq!(ConnectionState::Ready as u32, 3);
        assert_eq!(ConnectionState::EventLoop as u32, 4);
        assert_eq!(ConnectionState::Closed as u32, 5);
        assert_eq!(ConnectionState::Failed as u32, 6);
    }

    #[test]
    fn test_atomic_connection_state() {
        let state = AtomicConnectionState::default();
        assert_eq!(state.load(), ConnectionState::Connecting);

        for next in [
            ConnectionState::AwaitingHello,
            ConnectionState::Identifying,
            ConnectionState::Ready,
            ConnectionState::EventLoop,
            ConnectionState::Closed,
            ConnectionState::Failed,
        ] {
            state.store(next);
            assert_eq!(state.load(), next);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Failed.is_terminal());
        assert!(!ConnectionState::EventLoop.is_terminal());
    }
}
