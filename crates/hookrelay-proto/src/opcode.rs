//! Gateway operation codes.

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Role of an envelope in the gateway protocol.
///
/// Encoded on the wire as a bare integer. Values outside this set fail to
/// decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum OpCode {
    /// An application event (`t` names it, `s` orders it).
    Dispatch = 0,
    /// Liveness signal, sent by the client on the HELLO cadence.
    Heartbeat = 1,
    /// Handshake frame authenticating the client.
    Identify = 2,
    /// The gateway asks the client to reconnect.
    Reconnect = 7,
    /// The session was invalidated by the gateway.
    InvalidSession = 9,
    /// First frame of every connection; carries the heartbeat interval.
    Hello = 10,
    /// Gateway acknowledgement of a heartbeat.
    HeartbeatAck = 11,
}

impl OpCode {
    /// Whether frames with this opcode carry `s` and `t`.
    #[must_use]
    pub const fn is_dispatch(self) -> bool {
        matches!(self, Self::Dispatch)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Dispatch => "DISPATCH",
            Self::Heartbeat => "HEARTBEAT",
            Self::Identify => "IDENTIFY",
            Self::Reconnect => "RECONNECT",
            Self::InvalidSession => "INVALID_SESSION",
            Self::Hello => "HELLO",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(OpCode::Dispatch, "0" ; "dispatch")]
    #[test_case(OpCode::Heartbeat, "1" ; "heartbeat")]
    #[test_case(OpCode::Identify, "2" ; "identify")]
    #[test_case(OpCode::Reconnect, "7" ; "reconnect")]
    #[test_case(OpCode::InvalidSession, "9" ; "invalid session")]
    #[test_case(OpCode::Hello, "10" ; "hello")]
    #[test_case(OpCode::HeartbeatAck, "11" ; "heartbeat ack")]
    fn opcode_wire_value(op: OpCode, wire: &str) {
        assert_eq!(serde_json::to_string(&op).ok().as_deref(), Some(wire));
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        let result: Result<OpCode, _> = serde_json::from_str("3");
        assert!(result.is_err());
    }

    #[test]
    fn test_only_dispatch_is_dispatch() {
        assert!(OpCode::Dispatch.is_dispatch());
        assert!(!OpCode::Hello.is_dispatch());
        assert!(!OpCode::HeartbeatAck.is_dispatch());
    }

    #[test]
    fn test_display_uses_protocol_names() {
        assert_eq!(OpCode::InvalidSession.to_string(), "INVALID_SESSION");
        assert_eq!(OpCode::HeartbeatAck.to_string(), "HEARTBEAT_ACK");
    }
}
