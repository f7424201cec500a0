//! The chat relay engine: membership registry and event fan-out.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::entities::{ChatMember, MemberProfile};
use crate::interface::ChatInterface;
use crate::types::{ChatError, ChatEvent, ChatResult, EventPayload};

/// A bound participant, shared between the relay and its owner
pub type SharedInterface = Arc<Mutex<dyn ChatInterface>>;

/// Relay lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    Idle,
    Active,
}

/// One queued broadcast: an event plus an optional excluded interface
struct Delivery {
    event: ChatEvent,
    exclude: Option<String>,
}

struct RelayState {
    status: ChatStatus,
    interfaces: BTreeMap<String, SharedInterface>,
    members: BTreeMap<String, ChatMember>,
}

/// Single source of truth for chat membership and event fan-out within one
/// chat session. No cross-process state.
///
/// `ChatRelay` is a cheaply cloneable handle; clones share the same session.
/// Mutating operations are synchronous and never await: they update the
/// registries and push one delivery job onto a FIFO queue. Delivery happens
/// only when the dispatcher drains the queue — [`ChatRelay::run`] in
/// production, [`ChatRelay::dispatch_pending`] in tests — so a broadcast is
/// always asynchronous relative to the call that triggered it, and jobs
/// queued back-to-back are delivered in order.
#[derive(Clone)]
pub struct ChatRelay {
    state: Arc<Mutex<RelayState>>,
    queue: Arc<Mutex<VecDeque<Delivery>>>,
    wakeup: Arc<Notify>,
}

impl ChatRelay {
    /// Create an idle relay with no interfaces or members
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RelayState {
                status: ChatStatus::Idle,
                interfaces: BTreeMap::new(),
                members: BTreeMap::new(),
            })),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            wakeup: Arc::new(Notify::new()),
        }
    }

    /// Register a participant and assign it a unique interface id.
    ///
    /// Has no effect on chat membership; the new interface will receive
    /// broadcasts from this point on.
    pub fn bind_interface(&self, interface: SharedInterface) -> String {
        let id = cuid2::create_id();
        lock(&interface).assign_interface_id(id.clone());
        lock(&self.state).interfaces.insert(id.clone(), interface);
        debug!(interface_id = %id, "interface bound");
        id
    }

    /// Remove a bound interface.
    ///
    /// Members owned by the interface stay registered; remove them explicitly
    /// with [`ChatRelay::remove_participant`] first if that is intended.
    pub fn unbind_interface(&self, interface_id: &str) -> ChatResult<()> {
        let removed = lock(&self.state).interfaces.remove(interface_id);
        match removed {
            Some(_) => {
                debug!(interface_id = %interface_id, "interface unbound");
                Ok(())
            }
            None => Err(ChatError::internal(format!(
                "unknown interface: {interface_id}"
            ))),
        }
    }

    /// Transition Idle -> Active and broadcast `ChatStarted` with the full
    /// current member list. Re-entrant: calling while already active
    /// re-broadcasts current membership.
    pub fn start_chat(&self) {
        let members: Vec<MemberProfile> = {
            let mut state = lock(&self.state);
            state.status = ChatStatus::Active;
            state.members.values().map(ChatMember::profile).collect()
        };
        debug!(member_count = members.len(), "chat started");
        self.enqueue(
            ChatEvent::broadcast(None, EventPayload::ChatStarted { members }),
            None,
        );
    }

    /// Transition Active -> Idle and broadcast `ChatEnded`.
    ///
    /// Interfaces and members are kept; a subsequent [`ChatRelay::start_chat`]
    /// resumes with the same membership.
    pub fn stop_chat(&self) {
        lock(&self.state).status = ChatStatus::Idle;
        debug!("chat stopped");
        self.enqueue(ChatEvent::broadcast(None, EventPayload::ChatEnded), None);
    }

    /// Stop the chat and clear all interfaces and members.
    ///
    /// The queued `ChatEnded` broadcast resolves its recipients at dispatch
    /// time, so after cleanup it lands in an empty registry.
    pub fn cleanup_chat(&self) {
        self.stop_chat();
        let mut state = lock(&self.state);
        state.interfaces.clear();
        state.members.clear();
        debug!("chat cleaned up");
    }

    /// Admit a member under the given owning interface.
    ///
    /// Broadcasts `ChatParticipantJoined` to every bound interface except the
    /// owner (the owner already knows it joined). Fails with
    /// [`ChatError::NotActive`] unless the chat is active.
    pub fn add_participant(
        &self,
        interface_id: &str,
        nick_name: &str,
        avatar: &str,
    ) -> ChatResult<String> {
        let member = {
            let mut state = lock(&self.state);
            if state.status != ChatStatus::Active {
                return Err(ChatError::NotActive);
            }
            let member = ChatMember::new(nick_name, avatar, interface_id);
            state.members.insert(member.id.clone(), member.clone());
            member
        };

        debug!(member_id = %member.id, nick_name = %member.nick_name, "participant added");
        let profile = member.profile();
        self.enqueue(
            ChatEvent::broadcast(
                Some(member.id.clone()),
                EventPayload::ChatParticipantJoined { member: profile },
            ),
            Some(interface_id.to_string()),
        );
        Ok(member.id)
    }

    /// Remove a member and broadcast `ChatParticipantLeft` (sender = member id)
    /// to every interface except `interface_id`.
    pub fn remove_participant(&self, member_id: &str, interface_id: &str) -> ChatResult<()> {
        let removed = lock(&self.state).members.remove(member_id);
        if removed.is_none() {
            return Err(ChatError::internal(format!("unknown member: {member_id}")));
        }

        debug!(member_id = %member_id, "participant removed");
        self.enqueue(
            ChatEvent::broadcast(
                Some(member_id.to_string()),
                EventPayload::ChatParticipantLeft,
            ),
            Some(interface_id.to_string()),
        );
        Ok(())
    }

    /// Broadcast a chat message.
    ///
    /// `sender_id` defaults to `interface_id`, letting a bridge relay a
    /// message on behalf of a remote member. The sending interface is
    /// excluded from delivery.
    pub fn send_message(
        &self,
        interface_id: &str,
        message: impl Into<String>,
        metadata: Option<crate::types::MessageMetadata>,
        recipient_id: Option<String>,
        sender_id: Option<String>,
    ) -> ChatResult<()> {
        let sender = sender_id.unwrap_or_else(|| interface_id.to_string());
        let mut event = ChatEvent::broadcast(
            Some(sender),
            EventPayload::ChatMessage {
                message: message.into(),
                metadata,
            },
        );
        event.recipient_id = recipient_id;
        self.enqueue(event, Some(interface_id.to_string()));
        Ok(())
    }

    /// Broadcast a typing-started event, excluding the sender from delivery
    pub fn start_typing(&self, sender_id: &str, recipient_id: Option<String>) {
        let mut event = ChatEvent::broadcast(
            Some(sender_id.to_string()),
            EventPayload::ChatTypingStarted,
        );
        event.recipient_id = recipient_id;
        self.enqueue(event, Some(sender_id.to_string()));
    }

    /// Broadcast a typing-ended event, excluding the sender from delivery
    pub fn stop_typing(&self, sender_id: &str, recipient_id: Option<String>) {
        let mut event = ChatEvent::broadcast(
            Some(sender_id.to_string()),
            EventPayload::ChatTypingEnded,
        );
        event.recipient_id = recipient_id;
        self.enqueue(event, Some(sender_id.to_string()));
    }

    /// Current relay status
    pub fn status(&self) -> ChatStatus {
        lock(&self.state).status
    }

    /// Snapshot of the current member registry
    pub fn members(&self) -> Vec<ChatMember> {
        lock(&self.state).members.values().cloned().collect()
    }

    /// Look up a member by id
    pub fn member(&self, member_id: &str) -> Option<ChatMember> {
        lock(&self.state).members.get(member_id).cloned()
    }

    /// Number of bound interfaces
    pub fn interface_count(&self) -> usize {
        lock(&self.state).interfaces.len()
    }

    /// Drive the dispatcher until the handle is dropped.
    ///
    /// Spawn exactly one `run` task per relay; queued broadcasts are
    /// delivered in FIFO order as they arrive.
    pub async fn run(&self) {
        loop {
            self.dispatch_pending();
            self.wakeup.notified().await;
        }
    }

    /// Drain the delivery queue, invoking `on_event` per recipient.
    ///
    /// Recipients are resolved against the interface registry at dispatch
    /// time, in sorted-id order, skipping interfaces unbound in the meantime.
    /// Must not be called from inside `on_event`.
    pub fn dispatch_pending(&self) {
        while let Some(delivery) = lock(&self.queue).pop_front() {
            self.deliver(delivery);
        }
    }

    fn deliver(&self, delivery: Delivery) {
        let targets: Vec<(String, SharedInterface)> = lock(&self.state)
            .interfaces
            .iter()
            .filter(|(id, _)| delivery.exclude.as_deref() != Some(id.as_str()))
            .map(|(id, iface)| (id.clone(), iface.clone()))
            .collect();

        debug!(
            event = delivery.event.event_type_name(),
            recipients = targets.len(),
            "dispatching event"
        );

        for (id, iface) in targets {
            // an earlier recipient's callback may have unbound this one
            if !lock(&self.state).interfaces.contains_key(&id) {
                warn!(interface_id = %id, "recipient unbound mid-dispatch, skipping");
                continue;
            }
            let event = if delivery.event.recipient_id.is_none() {
                delivery.event.stamped_for(&id)
            } else {
                delivery.event.clone()
            };
            lock(&iface).on_event(event, self);
        }
    }

    fn enqueue(&self, event: ChatEvent, exclude: Option<String>) {
        lock(&self.queue).push_back(Delivery { event, exclude });
        self.wakeup.notify_one();
    }
}

impl Default for ChatRelay {
    fn default() -> Self {
        Self::new()
    }
}

// Poison-tolerant lock: a panicking participant must not wedge the relay.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageMetadata;

    /// Test stub that records every event it receives
    struct Recorder {
        id: Option<String>,
        events: Arc<Mutex<Vec<ChatEvent>>>,
    }

    impl Recorder {
        fn bind(relay: &ChatRelay) -> (String, Arc<Mutex<Vec<ChatEvent>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            let recorder = Arc::new(Mutex::new(Recorder {
                id: None,
                events: events.clone(),
            }));
            let id = relay.bind_interface(recorder);
            (id, events)
        }
    }

    impl ChatInterface for Recorder {
        fn interface_id(&self) -> Option<String> {
            self.id.clone()
        }

        fn assign_interface_id(&mut self, id: String) {
            self.id = Some(id);
        }

        fn on_event(&mut self, event: ChatEvent, _relay: &ChatRelay) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn recorded(events: &Arc<Mutex<Vec<ChatEvent>>>) -> Vec<ChatEvent> {
        events.lock().unwrap().clone()
    }

    #[test]
    fn test_bind_assigns_unique_ids() {
        let relay = ChatRelay::new();
        let (a, _) = Recorder::bind(&relay);
        let (b, _) = Recorder::bind(&relay);
        let (c, _) = Recorder::bind(&relay);

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert_eq!(relay.interface_count(), 3);
    }

    #[test]
    fn test_broadcast_is_deferred_until_dispatch() {
        let relay = ChatRelay::new();
        let (_, events) = Recorder::bind(&relay);

        relay.start_chat();
        assert!(recorded(&events).is_empty());

        relay.dispatch_pending();
        let seen = recorded(&events);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].event_type_name(), "chat_started");
    }

    #[test]
    fn test_start_chat_delivers_member_list_to_all() {
        let relay = ChatRelay::new();
        let (a_id, a_events) = Recorder::bind(&relay);
        let (_, b_events) = Recorder::bind(&relay);

        relay.start_chat();
        relay.dispatch_pending();
        let member_id = relay.add_participant(&a_id, "Alice", "").unwrap();
        relay.dispatch_pending();

        // restart re-broadcasts current membership to everyone
        relay.start_chat();
        relay.dispatch_pending();

        for events in [&a_events, &b_events] {
            let started: Vec<ChatEvent> = recorded(events)
                .into_iter()
                .filter(|e| e.event_type_name() == "chat_started")
                .collect();
            let last = started.last().unwrap();
            match &last.payload {
                EventPayload::ChatStarted { members } => {
                    assert_eq!(members.len(), 1);
                    assert_eq!(members[0].id, member_id);
                    assert_eq!(members[0].nick_name, "Alice");
                }
                other => panic!("unexpected payload: {other:?}"),
            }
        }
    }

    #[test]
    fn test_broadcast_stamps_recipient_per_delivery() {
        let relay = ChatRelay::new();
        let (a_id, a_events) = Recorder::bind(&relay);
        let (b_id, b_events) = Recorder::bind(&relay);

        relay.start_chat();
        relay.dispatch_pending();

        assert_eq!(recorded(&a_events)[0].recipient_id.as_deref(), Some(a_id.as_str()));
        assert_eq!(recorded(&b_events)[0].recipient_id.as_deref(), Some(b_id.as_str()));
    }

    #[test]
    fn test_add_participant_requires_active_chat() {
        let relay = ChatRelay::new();
        let (a_id, _) = Recorder::bind(&relay);

        let err = relay.add_participant(&a_id, "Alice", "").unwrap_err();
        assert!(matches!(err, ChatError::NotActive));
        assert!(relay.members().is_empty());
    }

    #[test]
    fn test_join_excludes_owning_interface() {
        let relay = ChatRelay::new();
        let (a_id, a_events) = Recorder::bind(&relay);
        let (_, b_events) = Recorder::bind(&relay);

        relay.start_chat();
        relay.dispatch_pending();

        relay.add_participant(&a_id, "Alice", "").unwrap();
        relay.dispatch_pending();

        let a_joins: Vec<_> = recorded(&a_events)
            .into_iter()
            .filter(|e| e.event_type_name() == "chat_participant_joined")
            .collect();
        let b_joins: Vec<_> = recorded(&b_events)
            .into_iter()
            .filter(|e| e.event_type_name() == "chat_participant_joined")
            .collect();

        assert!(a_joins.is_empty());
        assert_eq!(b_joins.len(), 1);
    }

    #[test]
    fn test_remove_unknown_member_is_internal_error() {
        let relay = ChatRelay::new();
        let (a_id, _) = Recorder::bind(&relay);
        relay.start_chat();
        relay.dispatch_pending();
        relay.add_participant(&a_id, "Alice", "").unwrap();

        let err = relay.remove_participant("nope", &a_id).unwrap_err();
        assert!(matches!(err, ChatError::Internal { .. }));
        assert_eq!(relay.members().len(), 1);
    }

    #[test]
    fn test_remove_participant_broadcasts_left() {
        let relay = ChatRelay::new();
        let (a_id, a_events) = Recorder::bind(&relay);
        let (_, b_events) = Recorder::bind(&relay);

        relay.start_chat();
        let member_id = relay.add_participant(&a_id, "Alice", "").unwrap();
        relay.remove_participant(&member_id, &a_id).unwrap();
        relay.dispatch_pending();

        let b_left: Vec<_> = recorded(&b_events)
            .into_iter()
            .filter(|e| e.event_type_name() == "chat_participant_left")
            .collect();
        assert_eq!(b_left.len(), 1);
        assert_eq!(b_left[0].sender_id.as_deref(), Some(member_id.as_str()));

        let a_left = recorded(&a_events)
            .into_iter()
            .any(|e| e.event_type_name() == "chat_participant_left");
        assert!(!a_left);
        assert!(relay.members().is_empty());
    }

    #[test]
    fn test_send_message_excludes_sender() {
        let relay = ChatRelay::new();
        let (a_id, a_events) = Recorder::bind(&relay);
        let (_, b_events) = Recorder::bind(&relay);
        let (_, c_events) = Recorder::bind(&relay);

        relay.start_chat();
        relay.dispatch_pending();
        relay
            .send_message(&a_id, "hi all", None, None, None)
            .unwrap();
        relay.dispatch_pending();

        let got_message = |events: &Arc<Mutex<Vec<ChatEvent>>>| {
            recorded(events)
                .into_iter()
                .any(|e| e.event_type_name() == "chat_message")
        };
        assert!(!got_message(&a_events));
        assert!(got_message(&b_events));
        assert!(got_message(&c_events));
    }

    #[test]
    fn test_send_message_sender_defaults_to_interface() {
        let relay = ChatRelay::new();
        let (a_id, _) = Recorder::bind(&relay);
        let (_, b_events) = Recorder::bind(&relay);

        relay.start_chat();
        relay.send_message(&a_id, "plain", None, None, None).unwrap();
        relay
            .send_message(&a_id, "relayed", None, None, Some("remote-1".into()))
            .unwrap();
        relay.dispatch_pending();

        let messages: Vec<_> = recorded(&b_events)
            .into_iter()
            .filter(|e| e.event_type_name() == "chat_message")
            .collect();
        assert_eq!(messages[0].sender_id.as_deref(), Some(a_id.as_str()));
        assert_eq!(messages[1].sender_id.as_deref(), Some("remote-1"));
    }

    #[test]
    fn test_typing_events_exclude_sender() {
        let relay = ChatRelay::new();
        let (a_id, a_events) = Recorder::bind(&relay);
        let (_, b_events) = Recorder::bind(&relay);

        relay.start_typing(&a_id, None);
        relay.stop_typing(&a_id, None);
        relay.dispatch_pending();

        assert!(recorded(&a_events).is_empty());
        let b_seen: Vec<&'static str> = recorded(&b_events)
            .iter()
            .map(|e| e.event_type_name())
            .collect();
        assert_eq!(b_seen, vec!["chat_typing_started", "chat_typing_ended"]);
    }

    #[test]
    fn test_directed_message_keeps_recipient() {
        let relay = ChatRelay::new();
        let (a_id, _) = Recorder::bind(&relay);
        let (b_id, b_events) = Recorder::bind(&relay);

        relay
            .send_message(&a_id, "psst", None, Some(b_id.clone()), None)
            .unwrap();
        relay.dispatch_pending();

        let messages = recorded(&b_events);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].recipient_id.as_deref(), Some(b_id.as_str()));
    }

    #[test]
    fn test_unbind_unknown_interface_is_internal_error() {
        let relay = ChatRelay::new();
        assert!(matches!(
            relay.unbind_interface("ghost"),
            Err(ChatError::Internal { .. })
        ));
    }

    #[test]
    fn test_unbound_interface_receives_nothing_further() {
        let relay = ChatRelay::new();
        let (a_id, a_events) = Recorder::bind(&relay);
        let (_, b_events) = Recorder::bind(&relay);

        relay.start_chat();
        relay.dispatch_pending();
        relay.unbind_interface(&a_id).unwrap();
        relay.stop_chat();
        relay.dispatch_pending();

        assert_eq!(recorded(&a_events).len(), 1);
        assert_eq!(recorded(&b_events).len(), 2);
    }

    #[test]
    fn test_stop_then_start_keeps_membership() {
        let relay = ChatRelay::new();
        let (a_id, _) = Recorder::bind(&relay);

        relay.start_chat();
        relay.add_participant(&a_id, "Alice", "").unwrap();
        relay.stop_chat();
        assert_eq!(relay.status(), ChatStatus::Idle);
        assert_eq!(relay.members().len(), 1);

        relay.start_chat();
        assert_eq!(relay.status(), ChatStatus::Active);
        assert_eq!(relay.members().len(), 1);
    }

    #[test]
    fn test_cleanup_empties_relay() {
        let relay = ChatRelay::new();
        let (a_id, a_events) = Recorder::bind(&relay);

        relay.start_chat();
        relay.add_participant(&a_id, "Alice", "").unwrap();
        relay.cleanup_chat();
        relay.dispatch_pending();

        assert_eq!(relay.status(), ChatStatus::Idle);
        assert!(relay.members().is_empty());
        assert_eq!(relay.interface_count(), 0);
        // recipients resolve at dispatch time, so nothing lands post-cleanup
        assert!(recorded(&a_events).is_empty());
    }

    #[test]
    fn test_fifo_ordering_across_broadcasts() {
        let relay = ChatRelay::new();
        let (a_id, _) = Recorder::bind(&relay);
        let (_, b_events) = Recorder::bind(&relay);

        relay.send_message(&a_id, "first", None, None, None).unwrap();
        relay.send_message(&a_id, "second", None, None, None).unwrap();
        relay.send_message(&a_id, "third", None, None, None).unwrap();
        relay.dispatch_pending();

        let texts: Vec<String> = recorded(&b_events)
            .into_iter()
            .filter_map(|e| match e.payload {
                EventPayload::ChatMessage { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_metadata_travels_with_message() {
        let relay = ChatRelay::new();
        let (a_id, _) = Recorder::bind(&relay);
        let (_, b_events) = Recorder::bind(&relay);

        let metadata = MessageMetadata::new("QuestionnaireAnswer", serde_json::json!({"v": 1}));
        relay
            .send_message(&a_id, "answer", Some(metadata), None, None)
            .unwrap();
        relay.dispatch_pending();

        match &recorded(&b_events)[0].payload {
            EventPayload::ChatMessage { metadata: Some(m), .. } => {
                assert_eq!(m.kind, "QuestionnaireAnswer");
                assert_eq!(m.data["v"], 1);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
