use serde::{Deserialize, Serialize};

/// Public profile of a chat member, as carried in relay events and on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    /// Relay-assigned member id
    pub id: String,
    /// Display name
    pub nick_name: String,
    /// Avatar reference, empty if unset
    #[serde(default)]
    pub avatar: String,
}

/// A logical occupant of the chat, registered under an owning interface.
///
/// The relay exclusively owns the member registry; the owning interface is
/// recorded by id only and does not own the member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMember {
    /// Relay-assigned member id, unique for the relay instance's lifetime
    pub id: String,
    /// Display name
    pub nick_name: String,
    /// Avatar reference, empty if unset
    pub avatar: String,
    /// Id of the interface that admitted this member
    pub owner_interface_id: String,
}

impl ChatMember {
    /// Create a member with a freshly minted id
    pub fn new(
        nick_name: impl Into<String>,
        avatar: impl Into<String>,
        owner_interface_id: impl Into<String>,
    ) -> Self {
        Self {
            id: cuid2::create_id(),
            nick_name: nick_name.into(),
            avatar: avatar.into(),
            owner_interface_id: owner_interface_id.into(),
        }
    }

    /// Public profile of this member
    pub fn profile(&self) -> MemberProfile {
        MemberProfile {
            id: self.id.clone(),
            nick_name: self.nick_name.clone(),
            avatar: self.avatar.clone(),
        }
    }

    /// Whether this member is owned by the given interface
    pub fn is_owned_by(&self, interface_id: &str) -> bool {
        self.owner_interface_id == interface_id
    }
}
