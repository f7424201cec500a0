//! The live network bridge: mirrors a remote chat session into the local
//! relay, and the local relay back over the wire.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use careline_relay::{
    ChatEvent, ChatInterface, ChatRelay, EventPayload, MemberProfile, MessageMetadata,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::BridgeResult;
use crate::packet::{
    JoinPayload, LeavePayload, MessagePayload, PacketKind, ReplyPayload, SessionCredentials,
    TypingPayload, WirePacket,
};
use crate::pending::PendingTable;
use crate::transport::{self, DisconnectReason, PacketSink, SocketEvent};

/// Interval between keep-alive packets once the socket is up
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// One row of the reconciliation table between the two id spaces.
///
/// `chat_engine_id` is the local relay member id; `socket_id` is the remote
/// peer's wire identifier, `None` for the mirrored local patient.
#[derive(Debug, Clone)]
pub struct BridgeParticipant {
    pub chat_engine_id: String,
    pub socket_id: Option<String>,
    pub nick_name: String,
    pub avatar: String,
}

/// A participant that forwards relay events across a persistent socket
/// connection, with packet acknowledgement and retransmission.
pub struct LiveBridge {
    interface_id: Option<String>,
    session: SessionCredentials,
    relay: ChatRelay,
    sink: Arc<dyn PacketSink>,
    pending: PendingTable,
    participants: Vec<BridgeParticipant>,
    /// The single mirrored local participant, by relay member id
    patient_id: Option<String>,
    keepalive: Option<JoinHandle<()>>,
}

impl LiveBridge {
    /// Create a bridge over an established sink
    pub fn new(session: SessionCredentials, relay: ChatRelay, sink: Arc<dyn PacketSink>) -> Self {
        Self {
            interface_id: None,
            session,
            relay,
            sink,
            pending: PendingTable::new(),
            participants: Vec::new(),
            patient_id: None,
            keepalive: None,
        }
    }

    /// Reconciliation table snapshot
    pub fn participants(&self) -> &[BridgeParticipant] {
        &self.participants
    }

    /// Currently mirrored local participant, if any
    pub fn patient_id(&self) -> Option<&str> {
        self.patient_id.as_deref()
    }

    /// Packets awaiting acknowledgement
    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    /// Start the periodic keep-alive. Idempotent; cancelled on disconnect.
    pub fn start_keepalive(&mut self) {
        if self.keepalive.is_some() {
            return;
        }
        let sink = self.sink.clone();
        let session = self.session.clone();
        let pending = self.pending.clone();
        self.keepalive = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(KEEP_ALIVE_INTERVAL);
            interval.tick().await; // the immediate first tick
            loop {
                interval.tick().await;
                if !sink.is_connected() {
                    break;
                }
                let packet = WirePacket::new(&session, PacketKind::Alive, Value::Null);
                sink.send(&packet);
                pending.track(packet, sink.clone());
            }
        }));
    }

    /// Process one inbound packet.
    ///
    /// Malformed or out-of-order packets are logged and ignored, never fatal.
    /// Receipt of anything but `REPLY` and `SDISCONNECT` is acknowledged
    /// regardless of what validation makes of the payload.
    pub fn handle_packet(&mut self, packet: WirePacket) {
        debug!(packet_id = %packet.id, kind = ?packet.kind, "inbound packet");
        match packet.kind {
            PacketKind::Reply => self.handle_reply(packet),
            PacketKind::Sdisconnect => {
                info!("remote session requested disconnect");
                self.sink.close();
                self.handle_disconnect(DisconnectReason::IntentionalRemote);
            }
            PacketKind::Join => {
                self.acknowledge(packet.id);
                self.handle_remote_join(packet.payload);
            }
            PacketKind::Leave => {
                self.acknowledge(packet.id);
                self.handle_remote_leave(packet.payload);
            }
            PacketKind::Message => {
                self.acknowledge(packet.id);
                self.handle_remote_message(packet.payload);
            }
            PacketKind::Typing => {
                self.acknowledge(packet.id);
                self.handle_remote_typing(packet.payload);
            }
            PacketKind::Alive => self.acknowledge(packet.id),
        }
    }

    fn acknowledge(&self, packet_id: uuid::Uuid) {
        self.sink
            .send(&WirePacket::reply_to(&self.session, packet_id));
    }

    /// Tear down after a disconnect.
    ///
    /// Intentional disconnects remove every tracked participant from the
    /// local relay; transient ones leave state for reconnection.
    pub fn handle_disconnect(&mut self, reason: DisconnectReason) {
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
        if !reason.is_intentional() {
            debug!(?reason, "transient disconnect, keeping chat state");
            return;
        }

        info!(?reason, "intentional disconnect, removing tracked participants");
        self.pending.clear();
        self.patient_id = None;
        let Some(interface_id) = self.interface_id.clone() else {
            self.participants.clear();
            return;
        };
        for participant in std::mem::take(&mut self.participants) {
            if let Err(error) = self
                .relay
                .remove_participant(&participant.chat_engine_id, &interface_id)
            {
                warn!(%error, member_id = %participant.chat_engine_id, "failed to remove participant during teardown");
            }
        }
    }

    fn handle_reply(&mut self, packet: WirePacket) {
        let Some(original) = self.pending.acknowledge(packet.id) else {
            debug!(packet_id = %packet.id, "reply for unknown packet, ignoring");
            return;
        };
        if original.kind == PacketKind::Join {
            match serde_json::from_value::<ReplyPayload>(packet.payload) {
                Ok(payload) => self.reconcile(payload),
                Err(error) => warn!(%error, "malformed join reply payload, ignoring"),
            }
        }
    }

    /// Bulk-reconcile the remote participant list and replay prior history
    /// into the local relay
    fn reconcile(&mut self, payload: ReplyPayload) {
        let Some(interface_id) = self.interface_id.clone() else {
            return;
        };
        for remote in payload.participants {
            let Some(socket_id) = remote.participant_id else {
                debug!("remote participant without id, skipping");
                continue;
            };
            if self.find_by_socket_id(&socket_id).is_some() {
                continue;
            }
            match self
                .relay
                .add_participant(&interface_id, &remote.nick_name, &remote.avatar)
            {
                Ok(chat_engine_id) => self.participants.push(BridgeParticipant {
                    chat_engine_id,
                    socket_id: Some(socket_id),
                    nick_name: remote.nick_name,
                    avatar: remote.avatar,
                }),
                Err(error) => warn!(%error, "could not admit remote participant"),
            }
        }

        for message in payload.history {
            let Some(sender) = message
                .participant_id
                .as_deref()
                .and_then(|sid| self.find_by_socket_id(sid))
                .map(|p| p.chat_engine_id.clone())
            else {
                debug!("history message from unknown participant, skipping");
                continue;
            };
            let metadata = message.metadata.and_then(decode_metadata);
            if let Err(error) = self.relay.send_message(
                &interface_id,
                message.message,
                metadata,
                None,
                Some(sender),
            ) {
                warn!(%error, "failed to replay history message");
            }
        }
    }

    fn handle_remote_join(&mut self, payload: Value) {
        let payload: JoinPayload = match serde_json::from_value(payload) {
            Ok(payload) => payload,
            Err(error) => return warn!(%error, "malformed join payload, ignoring"),
        };
        let Some(socket_id) = payload.participant_id else {
            warn!("join packet without participant id, dropping");
            return;
        };
        let Some(interface_id) = self.interface_id.clone() else {
            return;
        };
        if self.find_by_socket_id(&socket_id).is_some() {
            debug!(%socket_id, "remote participant already known");
            return;
        }
        match self
            .relay
            .add_participant(&interface_id, &payload.nick_name, &payload.avatar)
        {
            Ok(chat_engine_id) => {
                info!(%socket_id, member_id = %chat_engine_id, "remote participant joined");
                self.participants.push(BridgeParticipant {
                    chat_engine_id,
                    socket_id: Some(socket_id),
                    nick_name: payload.nick_name,
                    avatar: payload.avatar,
                });
            }
            Err(error) => warn!(%error, "could not admit remote participant"),
        }
    }

    fn handle_remote_leave(&mut self, payload: Value) {
        let payload: LeavePayload = match serde_json::from_value(payload) {
            Ok(payload) => payload,
            Err(error) => return warn!(%error, "malformed leave payload, ignoring"),
        };
        let Some(socket_id) = payload.participant_id else {
            return;
        };
        let Some(interface_id) = self.interface_id.clone() else {
            return;
        };
        let Some(position) = self
            .participants
            .iter()
            .position(|p| p.socket_id.as_deref() == Some(socket_id.as_str()))
        else {
            debug!(%socket_id, "leave for unknown participant, ignoring");
            return;
        };
        let participant = self.participants.remove(position);
        if let Err(error) = self
            .relay
            .remove_participant(&participant.chat_engine_id, &interface_id)
        {
            warn!(%error, "failed to remove departed remote participant");
        }
    }

    fn handle_remote_message(&mut self, payload: Value) {
        let payload: MessagePayload = match serde_json::from_value(payload) {
            Ok(payload) => payload,
            Err(error) => return warn!(%error, "malformed message payload, ignoring"),
        };
        let Some(interface_id) = self.interface_id.clone() else {
            return;
        };
        let Some(sender) = payload
            .participant_id
            .as_deref()
            .and_then(|sid| self.find_by_socket_id(sid))
            .map(|p| p.chat_engine_id.clone())
        else {
            debug!("message from unknown remote participant, ignoring");
            return;
        };
        let metadata = payload.metadata.and_then(decode_metadata);
        if let Err(error) =
            self.relay
                .send_message(&interface_id, payload.message, metadata, None, Some(sender))
        {
            warn!(%error, "failed to relay remote message");
        }
    }

    fn handle_remote_typing(&mut self, payload: Value) {
        let payload: TypingPayload = match serde_json::from_value(payload) {
            Ok(payload) => payload,
            Err(error) => return warn!(%error, "malformed typing payload, ignoring"),
        };
        let Some(sender) = payload
            .participant_id
            .as_deref()
            .and_then(|sid| self.find_by_socket_id(sid))
            .map(|p| p.chat_engine_id.clone())
        else {
            return;
        };
        if payload.started {
            self.relay.start_typing(&sender, None);
        } else {
            self.relay.stop_typing(&sender, None);
        }
    }

    /// Queue an outbound packet and place it in the waiting table.
    ///
    /// A silent no-op while disconnected: retransmission, not an error, is
    /// the recovery path.
    fn send_packet(&self, kind: PacketKind, payload: Value) {
        if !self.sink.is_connected() {
            debug!(?kind, "socket disconnected, not sending packet");
            return;
        }
        let packet = WirePacket::new(&self.session, kind, payload);
        self.sink.send(&packet);
        self.pending.track(packet, self.sink.clone());
    }

    fn find_by_socket_id(&self, socket_id: &str) -> Option<&BridgeParticipant> {
        self.participants
            .iter()
            .find(|p| p.socket_id.as_deref() == Some(socket_id))
    }

    fn is_remote_member(&self, member_id: &str) -> bool {
        self.participants
            .iter()
            .any(|p| p.chat_engine_id == member_id && p.socket_id.is_some())
    }

    fn mirror_local_join(&mut self, member: MemberProfile) {
        if let Some(existing) = &self.patient_id {
            if existing != &member.id {
                // single mirroring slot: flag, don't generalize
                warn!(member_id = %member.id, "bridge already mirrors a local participant, not forwarding join");
            }
            return;
        }
        self.patient_id = Some(member.id.clone());
        self.participants.push(BridgeParticipant {
            chat_engine_id: member.id.clone(),
            socket_id: None,
            nick_name: member.nick_name.clone(),
            avatar: member.avatar.clone(),
        });
        self.send_packet(
            PacketKind::Join,
            encode_payload(&JoinPayload {
                participant_id: Some(member.id),
                nick_name: member.nick_name,
                avatar: member.avatar,
            }),
        );
    }

    fn mirror_local_leave(&mut self, member_id: &str) {
        if self.patient_id.as_deref() != Some(member_id) {
            return;
        }
        self.patient_id = None;
        self.participants
            .retain(|p| p.chat_engine_id != member_id);
        self.send_packet(
            PacketKind::Leave,
            encode_payload(&LeavePayload {
                participant_id: Some(member_id.to_string()),
            }),
        );
    }
}

impl ChatInterface for LiveBridge {
    fn interface_id(&self) -> Option<String> {
        self.interface_id.clone()
    }

    fn assign_interface_id(&mut self, id: String) {
        self.interface_id = Some(id);
    }

    fn on_event(&mut self, event: ChatEvent, _relay: &ChatRelay) {
        match event.payload {
            EventPayload::ChatParticipantJoined { member } => {
                if !self.is_remote_member(&member.id) {
                    self.mirror_local_join(member);
                }
            }
            EventPayload::ChatParticipantLeft => {
                if let Some(member_id) = event.sender_id {
                    self.mirror_local_leave(&member_id);
                }
            }
            EventPayload::ChatMessage { message, metadata } => {
                // events attributed to remote members originated upstream
                if event
                    .sender_id
                    .as_deref()
                    .is_some_and(|id| self.is_remote_member(id))
                {
                    return;
                }
                self.send_packet(
                    PacketKind::Message,
                    encode_payload(&MessagePayload {
                        participant_id: event.sender_id,
                        message,
                        metadata: metadata.and_then(|m| serde_json::to_value(m).ok()),
                    }),
                );
            }
            EventPayload::ChatTypingEnded => {
                if event
                    .sender_id
                    .as_deref()
                    .is_some_and(|id| self.is_remote_member(id))
                {
                    return;
                }
                self.send_packet(
                    PacketKind::Typing,
                    encode_payload(&TypingPayload {
                        participant_id: event.sender_id,
                        started: false,
                    }),
                );
            }
            // typing-started stays local to avoid per-keystroke packet storms
            EventPayload::ChatTypingStarted => {}
            EventPayload::ChatStarted { .. } | EventPayload::ChatEnded => {}
        }
    }
}

/// Connect the socket, bind a bridge to the relay, and start driving it.
///
/// Returns the bridge handle and the driver task.
pub async fn connect_bridge(
    relay: &ChatRelay,
    session: SessionCredentials,
    endpoint: &str,
) -> BridgeResult<(Arc<Mutex<LiveBridge>>, JoinHandle<()>)> {
    let (sink, events) = transport::connect(endpoint).await?;
    let bridge = Arc::new(Mutex::new(LiveBridge::new(session, relay.clone(), sink)));
    relay.bind_interface(bridge.clone());
    lock(&bridge).start_keepalive();
    let driver = tokio::spawn(run_socket(bridge.clone(), events));
    Ok((bridge, driver))
}

/// Feed socket events into the bridge until the connection ends
pub async fn run_socket(
    bridge: Arc<Mutex<LiveBridge>>,
    mut events: mpsc::UnboundedReceiver<SocketEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SocketEvent::Packet(packet) => lock(&bridge).handle_packet(packet),
            SocketEvent::Disconnected(reason) => {
                lock(&bridge).handle_disconnect(reason);
                break;
            }
        }
    }
}

fn lock(bridge: &Arc<Mutex<LiveBridge>>) -> MutexGuard<'_, LiveBridge> {
    bridge.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn encode_payload<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

fn decode_metadata(value: Value) -> Option<MessageMetadata> {
    match serde_json::from_value(value) {
        Ok(metadata) => Some(metadata),
        Err(error) => {
            warn!(%error, "malformed message metadata, dropping it");
            None
        }
    }
}
