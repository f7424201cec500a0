//! Event types broadcast through the chat relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::MemberProfile;

/// An immutable relay event.
///
/// `recipient_id = None` means the event is a broadcast; the relay stamps a
/// per-delivery copy with each receiving interface's id at dispatch time.
/// Events addressed to a specific recipient are delivered unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    /// Originating member or interface id, if any
    pub sender_id: Option<String>,
    /// Target interface id; `None` for broadcasts
    pub recipient_id: Option<String>,
    /// Event payload
    #[serde(flatten)]
    pub payload: EventPayload,
    /// When the event was created
    pub timestamp: DateTime<Utc>,
}

/// Event payload union
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    /// The chat session became active; carries the full current member list
    ChatStarted { members: Vec<MemberProfile> },

    /// The chat session ended
    ChatEnded,

    /// A member was admitted to the chat
    ChatParticipantJoined { member: MemberProfile },

    /// A member left the chat; the subject is carried in `sender_id`
    ChatParticipantLeft,

    /// A chat message
    ChatMessage {
        message: String,
        metadata: Option<MessageMetadata>,
    },

    /// A member started typing
    ChatTypingStarted,

    /// A member stopped typing
    ChatTypingEnded,
}

/// Structured metadata attached to a chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Discriminator understood by the receiving participant
    pub kind: String,
    /// Kind-specific payload
    pub data: serde_json::Value,
}

impl ChatEvent {
    /// Create a broadcast event (no specific recipient)
    pub fn broadcast(sender_id: Option<String>, payload: EventPayload) -> Self {
        Self {
            sender_id,
            recipient_id: None,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Create an event addressed to a specific interface
    pub fn direct(
        sender_id: Option<String>,
        recipient_id: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            sender_id,
            recipient_id: Some(recipient_id.into()),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Copy of this event with the recipient stamped in, used when fanning a
    /// broadcast out to an individual interface
    pub fn stamped_for(&self, recipient_id: &str) -> Self {
        let mut copy = self.clone();
        copy.recipient_id = Some(recipient_id.to_string());
        copy
    }

    /// Event type name for logging/metrics
    pub fn event_type_name(&self) -> &'static str {
        match self.payload {
            EventPayload::ChatStarted { .. } => "chat_started",
            EventPayload::ChatEnded => "chat_ended",
            EventPayload::ChatParticipantJoined { .. } => "chat_participant_joined",
            EventPayload::ChatParticipantLeft => "chat_participant_left",
            EventPayload::ChatMessage { .. } => "chat_message",
            EventPayload::ChatTypingStarted => "chat_typing_started",
            EventPayload::ChatTypingEnded => "chat_typing_ended",
        }
    }
}

impl MessageMetadata {
    /// Create metadata with the given kind and payload
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}
