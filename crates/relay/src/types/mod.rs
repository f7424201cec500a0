//! Shared types for the chat relay.

pub mod errors;
pub mod events;

pub use errors::{ChatError, ChatResult};
pub use events::{ChatEvent, EventPayload, MessageMetadata};
