//! # Careline Bridge Crate
//!
//! A chat participant that mirrors a remote chat session — reached over a
//! persistent WebSocket — into the local relay, and vice versa, with
//! at-least-once packet delivery: every non-acknowledgement packet is
//! retransmitted on a timer until a matching `REPLY` arrives or retries run
//! out.

mod bridge;
mod error;
mod packet;
mod pending;
mod transport;

pub use bridge::{
    connect_bridge, run_socket, BridgeParticipant, LiveBridge, KEEP_ALIVE_INTERVAL,
};
pub use error::{BridgeError, BridgeResult};
pub use packet::{
    JoinPayload, LeavePayload, MessagePayload, PacketKind, RemoteMessage, RemoteParticipant,
    ReplyPayload, SessionCredentials, TypingPayload, WirePacket,
};
pub use pending::{DeliveryState, PendingTable, MAX_ATTEMPTS, RETRY_TIMEOUT};
pub use transport::{connect, DisconnectReason, PacketSink, SocketEvent, SocketSink};
