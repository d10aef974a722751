//! The wire envelope and its codec.
//!
//! Every gateway frame is a UTF-8 JSON object of the form
//! `{"op": <int>, "d": <any>, "s": <int?>, "t": <string?>}`. `s` and `t` are
//! only meaningful on dispatch frames; [`Envelope::decode`] rejects frames that
//! break that rule so callers never have to re-check it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtoError;
use crate::opcode::OpCode;
use crate::payload::{Hello, Identify};

/// One frame exchanged over the gateway socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Operation code.
    pub op: OpCode,
    /// Payload; `null` when the frame carries none.
    #[serde(default)]
    pub d: Value,
    /// Sequence number (dispatch only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    /// Event name (dispatch only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl Envelope {
    /// Create a dispatch frame.
    #[must_use]
    pub fn dispatch(sequence: u64, event: impl Into<String>, d: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d,
            s: Some(sequence),
            t: Some(event.into()),
        }
    }

    /// Create a heartbeat frame carrying the last seen sequence number.
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            d: last_sequence.map_or(Value::Null, Value::from),
            s: None,
            t: None,
        }
    }

    /// Create a hello frame.
    #[must_use]
    pub fn hello(heartbeat_interval_ms: u64) -> Self {
        Self {
            op: OpCode::Hello,
            d: serde_json::json!({ "heartbeat_interval": heartbeat_interval_ms }),
            s: None,
            t: None,
        }
    }

    /// Create an identify frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn identify(identify: &Identify) -> Result<Self, ProtoError> {
        let d = serde_json::to_value(identify)
            .map_err(|e| ProtoError::Encoding(e.to_string()))?;
        Ok(Self {
            op: OpCode::Identify,
            d,
            s: None,
            t: None,
        })
    }

    /// Create a frame with no payload.
    #[must_use]
    pub const fn bare(op: OpCode) -> Self {
        Self {
            op,
            d: Value::Null,
            s: None,
            t: None,
        }
    }

    /// Check the dispatch-only field rule.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::MissingField`] for a dispatch without `s` or `t`,
    /// and [`ProtoError::Validation`] for any other frame that carries them.
    pub fn validate(&self) -> Result<(), ProtoError> {
        if self.op.is_dispatch() {
            if self.s.is_none() {
                return Err(ProtoError::MissingField("s"));
            }
            if self.t.is_none() {
                return Err(ProtoError::MissingField("t"));
            }
        } else if self.s.is_some() || self.t.is_some() {
            return Err(ProtoError::Validation(format!(
                "{} frame must not carry a sequence number or event name",
                self.op
            )));
        }
        Ok(())
    }

    /// Serialize to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope is invalid or serialization fails.
    pub fn encode(&self) -> Result<String, ProtoError> {
        self.validate()?;
        serde_json::to_string(self).map_err(|e| ProtoError::Encoding(e.to_string()))
    }

    /// Deserialize and validate JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a well-formed envelope.
    pub fn decode(text: &str) -> Result<Self, ProtoError> {
        let envelope: Self =
            serde_json::from_str(text).map_err(|e| ProtoError::Decoding(e.to_string()))?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Require a specific opcode.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::UnexpectedOpcode`] when `op` differs.
    pub fn expect_op(&self, expected: OpCode) -> Result<(), ProtoError> {
        if self.op == expected {
            Ok(())
        } else {
            Err(ProtoError::UnexpectedOpcode {
                expected,
                actual: self.op,
            })
        }
    }

    /// Decode the payload into a typed schema.
    ///
    /// # Errors
    ///
    /// Returns an error if `d` does not match `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ProtoError> {
        T::deserialize(&self.d).map_err(|e| ProtoError::Decoding(e.to_string()))
    }

    /// Decode a hello frame's payload.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a hello frame, the interval is missing,
    /// or the interval is zero.
    pub fn hello_payload(&self) -> Result<Hello, ProtoError> {
        self.expect_op(OpCode::Hello)?;
        let hello: Hello = self
            .payload()
            .map_err(|_| ProtoError::MissingField("heartbeat_interval"))?;
        if hello.heartbeat_interval == 0 {
            return Err(ProtoError::Validation(
                "heartbeat_interval must be greater than 0".to_string(),
            ));
        }
        Ok(hello)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{intents, ConnectionProperties};
    use serde_json::json;

    #[test]
    fn test_decode_hello() {
        let text = r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#;
        let env = Envelope::decode(text).unwrap();
        assert_eq!(env.op, OpCode::Hello);
        assert_eq!(env.hello_payload().unwrap().heartbeat_interval, 41250);
    }

    #[test]
    fn test_decode_dispatch() {
        let env = Envelope::decode(
            r#"{"op":0,"s":3,"t":"MESSAGE_CREATE","d":{"content":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(env.s, Some(3));
        assert_eq!(env.t.as_deref(), Some("MESSAGE_CREATE"));
        assert_eq!(env.d, json!({"content": "hi"}));
    }

    #[test]
    fn test_decode_missing_payload_is_null() {
        let env = Envelope::decode(r#"{"op":11}"#).unwrap();
        assert_eq!(env.op, OpCode::HeartbeatAck);
        assert!(env.d.is_null());
    }

    #[test]
    fn test_dispatch_without_event_name_rejected() {
        let err = Envelope::decode(r#"{"op":0,"s":1,"d":{}}"#).unwrap_err();
        assert!(matches!(err, ProtoError::MissingField("t")));
    }

    #[test]
    fn test_dispatch_without_sequence_rejected() {
        let err = Envelope::decode(r#"{"op":0,"t":"READY","d":{}}"#).unwrap_err();
        assert!(matches!(err, ProtoError::MissingField("s")));
    }

    #[test]
    fn test_non_dispatch_with_event_name_rejected() {
        let err = Envelope::decode(r#"{"op":11,"t":"READY","d":null}"#).unwrap_err();
        assert!(matches!(err, ProtoError::Validation(_)));
    }

    #[test]
    fn test_unknown_opcode_is_decoding_error() {
        let err = Envelope::decode(r#"{"op":42,"d":null}"#).unwrap_err();
        assert!(matches!(err, ProtoError::Decoding(_)));
    }

    #[test]
    fn test_not_json_is_decoding_error() {
        assert!(matches!(
            Envelope::decode("not json"),
            Err(ProtoError::Decoding(_))
        ));
    }

    #[test]
    fn test_heartbeat_encoding() {
        assert_eq!(
            Envelope::heartbeat(None).encode().unwrap(),
            r#"{"op":1,"d":null}"#
        );
        assert_eq!(
            Envelope::heartbeat(Some(17)).encode().unwrap(),
            r#"{"op":1,"d":17}"#
        );
    }

    #[test]
    fn test_identify_encoding() {
        let identify = Identify::new("secret", intents::DEFAULT, ConnectionProperties::default());
        let text = Envelope::identify(&identify).unwrap().encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["token"], "secret");
        assert_eq!(value["d"]["intents"], 513);
        assert_eq!(value["d"]["properties"]["os"], std::env::consts::OS);
        assert!(value.get("s").is_none());
        assert!(value.get("t").is_none());
    }

    #[test]
    fn test_hello_payload_on_wrong_opcode() {
        let err = Envelope::bare(OpCode::HeartbeatAck).hello_payload().unwrap_err();
        assert!(matches!(
            err,
            ProtoError::UnexpectedOpcode {
                expected: OpCode::Hello,
                actual: OpCode::HeartbeatAck
            }
        ));
    }

    #[test]
    fn test_hello_payload_missing_interval() {
        let env = Envelope::decode(r#"{"op":10,"d":{}}"#).unwrap();
        assert!(matches!(
            env.hello_payload(),
            Err(ProtoError::MissingField("heartbeat_interval"))
        ));
    }

    #[test]
    fn test_hello_payload_zero_interval() {
        assert!(matches!(
            Envelope::hello(0).hello_payload(),
            Err(ProtoError::Validation(_))
        ));
    }

    #[test]
    fn test_encode_rejects_invalid_dispatch() {
        let mut env = Envelope::dispatch(1, "READY", json!({}));
        env.t = None;
        assert!(env.encode().is_err());
    }
}
