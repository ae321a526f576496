//! Wire message model
//!
//! Every frame on the connection is one JSON-encoded [`Message`]:
//!
//! ```text
//! {"sender":"websocket-demo","receiver":"server","timestamp":"2024-05-01T09:30:00.123456Z","type":"demo-start","payload":{...}}
//! ```
//!
//! Callers submit an [`OutboundMessage`] (no timestamp). The connection loop
//! stamps it at the moment it is written to the wire, so a message that sat
//! in the outbound queue carries its transmission time, not its submission
//! time.

use crate::error::{LiveSocketError, Result};
use crate::transport::WsMessage;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Receiver value addressing every connected client
pub const BROADCAST: &str = "*";

/// The unit of communication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Logical origin (client component or server)
    pub sender: String,
    /// Intended recipient; empty or `*` means broadcast
    pub receiver: String,
    /// RFC 3339 transmission time
    pub timestamp: String,
    /// Discriminator used by recipients to interpret `payload`
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque structured data
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    /// Decode an inbound frame
    ///
    /// Only text frames carry messages; binary frames are rejected.
    pub fn decode(frame: &WsMessage) -> Result<Self> {
        let text = frame
            .as_text()
            .ok_or_else(|| LiveSocketError::ParseError("binary frame".to_string()))?;
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as a text frame
    pub fn encode(&self) -> Result<WsMessage> {
        serde_json::to_string(self)
            .map(WsMessage::Text)
            .map_err(|e| LiveSocketError::EncodeError(e.to_string()))
    }

    pub fn is_broadcast(&self) -> bool {
        self.receiver.is_empty() || self.receiver == BROADCAST
    }

    /// Whether a client with `client_id` should receive this message
    pub fn is_addressed_to(&self, client_id: &str) -> bool {
        self.is_broadcast() || self.receiver == client_id
    }

    /// Deserialize the payload into a concrete type
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Parsed timestamp, if it is valid RFC 3339
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// A message submitted for sending, before it has been stamped
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub sender: String,
    pub receiver: String,
    pub kind: String,
    pub payload: Value,
}

impl OutboundMessage {
    /// Build a message from any serializable payload
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        kind: impl Into<String>,
        payload: impl Serialize,
    ) -> Result<Self> {
        let payload =
            serde_json::to_value(payload).map_err(|e| LiveSocketError::EncodeError(e.to_string()))?;
        Ok(Self::with_value(sender, receiver, kind, payload))
    }

    /// Build a message from an already-built JSON payload
    pub fn with_value(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        kind: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            kind: kind.into(),
            payload,
        }
    }

    /// Attach the transmission timestamp
    pub fn stamp(self, timestamp: String) -> Message {
        Message {
            sender: self.sender,
            receiver: self.receiver,
            timestamp,
            kind: self.kind,
            payload: self.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_frame() {
        let frame = WsMessage::Text(
            r#"{"sender":"server","receiver":"*","timestamp":"2024-05-01T09:30:00Z","type":"server-tick","payload":{"message":"server tick #1"}}"#
                .to_string(),
        );

        let message = Message::decode(&frame).unwrap();
        assert_eq!(message.sender, "server");
        assert_eq!(message.kind, "server-tick");
        assert!(message.is_broadcast());
        assert_eq!(message.payload["message"], "server tick #1");
    }

    #[test]
    fn test_decode_defaults_missing_payload() {
        let frame = WsMessage::Text(
            r#"{"sender":"a","receiver":"b","timestamp":"2024-05-01T09:30:00Z","type":"ping"}"#
                .to_string(),
        );

        let message = Message::decode(&frame).unwrap();
        assert_eq!(message.payload, Value::Null);
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        for text in ["not json", "[1,2,3]", r#"{"sender":"a"}"#, ""] {
            assert!(Message::decode(&WsMessage::Text(text.to_string())).is_err());
        }
        assert!(Message::decode(&WsMessage::Binary(b"{}".to_vec())).is_err());
    }

    #[test]
    fn test_encode_uses_type_field() {
        let message = OutboundMessage::with_value("demo", "server", "ping", json!({}))
            .stamp("2024-05-01T09:30:00.000001Z".to_string());

        let frame = message.encode().unwrap();
        let value: Value = serde_json::from_str(frame.as_text().unwrap()).unwrap();
        assert_eq!(value["type"], "ping");
        assert_eq!(value["timestamp"], "2024-05-01T09:30:00.000001Z");
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn test_addressing() {
        let mut message = OutboundMessage::with_value("server", "", "tick", Value::Null)
            .stamp(String::new());
        assert!(message.is_addressed_to("anyone"));

        message.receiver = "client-a".to_string();
        assert!(message.is_addressed_to("client-a"));
        assert!(!message.is_addressed_to("client-b"));
    }

    #[test]
    fn test_payload_as() {
        #[derive(Deserialize)]
        struct Tick {
            message: String,
        }

        let message = OutboundMessage::new("s", "*", "tick", json!({"message": "hello"}))
            .unwrap()
            .stamp(String::new());
        let tick: Tick = message.payload_as().unwrap();
        assert_eq!(tick.message, "hello");
    }
}
