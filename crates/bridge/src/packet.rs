//! Wire packets exchanged with the remote chat session.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Session identity attached to every packet.
///
/// Packets authenticate implicitly through the session key; there is no
/// separate handshake.
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    pub session_id: i64,
    pub session_key: String,
}

/// Packet discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    #[serde(rename = "JOIN")]
    Join,
    #[serde(rename = "LEAVE")]
    Leave,
    #[serde(rename = "MESSAGE")]
    Message,
    #[serde(rename = "TYPING")]
    Typing,
    #[serde(rename = "ALIVE")]
    Alive,
    #[serde(rename = "REPLY")]
    Reply,
    #[serde(rename = "SDISCONNECT")]
    Sdisconnect,
}

/// One unit of wire protocol exchange.
///
/// A `REPLY` packet carries the id of the packet it acknowledges instead of a
/// fresh one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePacket {
    pub id: Uuid,
    #[serde(rename = "sessionID")]
    pub session_id: i64,
    pub session_key: String,
    #[serde(rename = "type")]
    pub kind: PacketKind,
    #[serde(default)]
    pub payload: Value,
}

impl WirePacket {
    /// Create a packet with a fresh id
    pub fn new(session: &SessionCredentials, kind: PacketKind, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session.session_id,
            session_key: session.session_key.clone(),
            kind,
            payload,
        }
    }

    /// Create the acknowledgement for a received packet
    pub fn reply_to(session: &SessionCredentials, acked_id: Uuid) -> Self {
        Self {
            id: acked_id,
            session_id: session.session_id,
            session_key: session.session_key.clone(),
            kind: PacketKind::Reply,
            payload: serde_json::json!({ "status": "OK" }),
        }
    }
}

/// `JOIN` payload: a participant entering the remote session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub avatar: String,
}

/// `LEAVE` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePayload {
    #[serde(default)]
    pub participant_id: Option<String>,
}

/// `MESSAGE` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// `TYPING` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub started: bool,
}

/// `REPLY` payload. For a `JOIN` acknowledgement the remote side includes its
/// full participant list and prior message history for reconciliation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub participants: Vec<RemoteParticipant>,
    #[serde(default)]
    pub history: Vec<RemoteMessage>,
}

/// A participant as described by the remote session
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteParticipant {
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub avatar: String,
}

/// A historical message as described by the remote session
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}
