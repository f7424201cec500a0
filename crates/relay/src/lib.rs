//! # Careline Relay Crate
//!
//! In-process pub/sub chat relay connecting multiple logical chat
//! participants (patients, bots, live-agent bridges) within a single process.
//!
//! ## Architecture
//!
//! - **Entities**: domain models (`ChatMember`, `MemberProfile`)
//! - **Types**: events, metadata, and error types
//! - **Interface**: the capability contract every participant implements
//! - **Engine**: the relay hub — membership registry plus queued event fan-out
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use careline_relay::{ChatRelay, ChatInterface};
//!
//! # struct MyParticipant;
//! # impl ChatInterface for MyParticipant {
//! #     fn interface_id(&self) -> Option<String> { None }
//! #     fn assign_interface_id(&mut self, _id: String) {}
//! #     fn on_event(&mut self, _e: careline_relay::ChatEvent, _r: &ChatRelay) {}
//! # }
//! let relay = ChatRelay::new();
//! let id = relay.bind_interface(Arc::new(Mutex::new(MyParticipant)));
//! relay.start_chat();
//! # let _ = id;
//! ```

pub mod entities;
pub mod types;

mod engine;
mod interface;

pub use engine::{ChatRelay, ChatStatus, SharedInterface};
pub use entities::{ChatMember, MemberProfile};
pub use interface::ChatInterface;
pub use types::{ChatError, ChatEvent, ChatResult, EventPayload, MessageMetadata};
