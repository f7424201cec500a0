//! Domain entities for the chat relay.

pub mod member;

pub use member::{ChatMember, MemberProfile};
