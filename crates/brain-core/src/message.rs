//! Message types exchanged with the transport layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A chat message received from a transport.
///
/// Messages are created on receipt and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender identifier (phone number, user id, ...).
    pub sender: String,
    /// The raw message text.
    pub text: String,
    /// Receipt timestamp in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Conversation the message belongs to.
    pub conversation_id: String,
}

impl InboundMessage {
    /// Create a message from a one-to-one conversation.
    ///
    /// The sender id doubles as the conversation id.
    pub fn direct(sender: impl Into<String>, text: impl Into<String>, timestamp: u64) -> Self {
        let sender = sender.into();
        Self {
            conversation_id: sender.clone(),
            sender,
            text: text.into(),
            timestamp,
        }
    }

    /// Create a message belonging to an explicit conversation.
    pub fn in_conversation(
        sender: impl Into<String>,
        text: impl Into<String>,
        timestamp: u64,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            timestamp,
            conversation_id: conversation_id.into(),
        }
    }
}

/// Overall outcome of handling a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The request was fully resolved.
    Ok,
    /// Some optional or secondary work failed; the content is degraded.
    PartialFailure,
    /// Nothing could serve the request.
    Failed,
}

/// Observability data attached to every response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Top classified intent, if classification ran.
    pub intent: Option<String>,
    /// The execution path that produced the final content.
    pub served_by: Option<String>,
    /// Every path attempted, in order, including the one that served.
    pub attempted: Vec<String>,
    /// User-safe descriptions of the failures encountered.
    pub errors: Vec<String>,
    /// Wall-clock time spent handling the request.
    pub latency_ms: u64,
}

/// A response to hand back to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Conversation to deliver the response to.
    pub recipient: String,
    /// Human-readable text.
    pub text: String,
    /// Structured payload merged from tool results, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Map<String, Value>>,
    /// Outcome of the request.
    pub status: ResponseStatus,
    /// Path, latency and error bookkeeping.
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

impl OutboundMessage {
    /// Create a successful text reply to a message.
    pub fn reply_to(original: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            recipient: original.conversation_id.clone(),
            text: text.into(),
            structured_data: None,
            status: ResponseStatus::Ok,
            metadata: ResponseMetadata::default(),
        }
    }

    /// Create a failed reply carrying a user-safe explanation.
    pub fn failed(original: &InboundMessage, explanation: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failed,
            ..Self::reply_to(original, explanation)
        }
    }

    /// Attach structured data.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.structured_data = Some(data);
        self
    }

    /// Override the status.
    pub fn with_status(mut self, status: ResponseStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the request was served at all.
    pub fn is_success(&self) -> bool {
        self.status != ResponseStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_message_uses_sender_as_conversation() {
        let msg = InboundMessage::direct("+15551234567", "hi", 42);
        assert_eq!(msg.conversation_id, "+15551234567");
        assert_eq!(msg.sender, "+15551234567");
        assert_eq!(msg.timestamp, 42);
    }

    #[test]
    fn test_reply_targets_conversation() {
        let msg = InboundMessage::in_conversation("alice", "hi", 1, "room-7");
        let reply = OutboundMessage::reply_to(&msg, "hello");
        assert_eq!(reply.recipient, "room-7");
        assert_eq!(reply.status, ResponseStatus::Ok);
        assert!(reply.structured_data.is_none());
        assert!(reply.is_success());
    }

    #[test]
    fn test_failed_reply() {
        let msg = InboundMessage::direct("bob", "hi", 1);
        let reply = OutboundMessage::failed(&msg, "Sorry, try again later.");
        assert_eq!(reply.status, ResponseStatus::Failed);
        assert!(!reply.is_success());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ResponseStatus::PartialFailure).unwrap();
        assert_eq!(json, "\"partial_failure\"");
    }
}
