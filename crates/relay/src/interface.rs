//! The participant contract every chat interface implements.

use crate::engine::ChatRelay;
use crate::types::ChatEvent;

/// Capability contract for a chat participant.
///
/// The relay holds a collection of values satisfying this trait and never
/// inspects concrete types. An interface may own zero or more chat members;
/// a bridge interface typically owns one member per remote participant.
///
/// `on_event` is invoked by the relay dispatcher, never from inside the call
/// that triggered the broadcast. Implementations must not block: network and
/// timer work belongs in spawned tasks, not in the event callback.
pub trait ChatInterface: Send {
    /// The relay-assigned identity, `None` until bound
    fn interface_id(&self) -> Option<String>;

    /// Store the identity assigned by the relay at bind time
    fn assign_interface_id(&mut self, id: String);

    /// Receive a relay event. `relay` may be used to issue further relay
    /// calls; their broadcasts are queued, not delivered re-entrantly.
    fn on_event(&mut self, event: ChatEvent, relay: &ChatRelay);
}
