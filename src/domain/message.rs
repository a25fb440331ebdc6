//! Chat message types: what clients send, what the hub routes, and what
//! recipients receive.
//!
//! The hub never looks inside `body`; it only routes [`Envelope`]s.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ClientId;

/// Frame payload sent by a client: just the text it wants to publish.
///
/// The sender's display name and timestamp are stamped server-side, so a
/// client cannot impersonate another name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    /// Message text. `message` is accepted as an alias.
    #[serde(alias = "message")]
    pub body: String,
}

impl InboundMessage {
    /// Decodes one inbound frame payload.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if the bytes are not a JSON object
    /// with a string `body` field.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Wire record delivered to every recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the sending connection.
    pub name: String,
    /// Opaque message text.
    pub body: String,
    /// Time the hub-side read pump received the frame.
    pub when: DateTime<Utc>,
}

impl ChatMessage {
    /// Builds a message stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            when: Utc::now(),
        }
    }

    /// Encodes the message as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if serialization fails.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A message tagged with the registration that produced it.
///
/// Immutable once built. The hub hands the same `Arc` to every recipient
/// queue instead of copying the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Registration whose read pump decoded the frame.
    pub sender: ClientId,
    /// Routed payload.
    pub message: ChatMessage,
}

impl Envelope {
    /// Wraps `message` from `sender` into a shareable envelope.
    #[must_use]
    pub fn new(sender: ClientId, message: ChatMessage) -> Arc<Self> {
        Arc::new(Self { sender, message })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_body_and_alias() {
        let Ok(a) = InboundMessage::decode(br#"{"body":"hello"}"#) else {
            panic!("body should decode");
        };
        let Ok(b) = InboundMessage::decode(br#"{"message":"hello"}"#) else {
            panic!("alias should decode");
        };
        assert_eq!(a, b);
        assert_eq!(a.body, "hello");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(InboundMessage::decode(b"not json").is_err());
        assert!(InboundMessage::decode(br#"{"body":42}"#).is_err());
        assert!(InboundMessage::decode(br#"{}"#).is_err());
    }

    #[test]
    fn encode_has_name_body_when() {
        let msg = ChatMessage::new("alice", "hi there");
        let Ok(json) = msg.encode() else {
            panic!("encode failed");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&json) else {
            panic!("not json");
        };
        assert_eq!(value["name"], "alice");
        assert_eq!(value["body"], "hi there");
        assert!(value["when"].is_string());
    }

    #[test]
    fn envelope_keeps_sender() {
        let sender = ClientId::new();
        let env = Envelope::new(sender, ChatMessage::new("a", "b"));
        assert_eq!(env.sender, sender);
        assert_eq!(env.message.body, "b");
    }
}
