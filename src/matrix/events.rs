//! Wire-level Matrix event and public-room models.
//!
//! Events arrive from two places with the same shape: appservice transaction
//! batches and full room-state fetches. Content is kept as raw JSON and read
//! through fail-soft accessors; a missing or mistyped field degrades to the
//! caller's default instead of failing the event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// State event types that can change a room's directory eligibility.
pub mod event_type {
    pub const MEMBER: &str = "m.room.member";
    pub const JOIN_RULES: &str = "m.room.join_rules";
    pub const GUEST_ACCESS: &str = "m.room.guest_access";
    pub const HISTORY_VISIBILITY: &str = "m.room.history_visibility";
    pub const NAME: &str = "m.room.name";
    pub const TOPIC: &str = "m.room.topic";
    pub const AVATAR: &str = "m.room.avatar";
    pub const CANONICAL_ALIAS: &str = "m.room.canonical_alias";
    pub const MESSAGE: &str = "m.room.message";
}

/// The eight state event types the directory watches for room updates.
pub const DIRECTORY_EVENT_TYPES: [&str; 8] = [
    event_type::MEMBER,
    event_type::JOIN_RULES,
    event_type::GUEST_ACCESS,
    event_type::HISTORY_VISIBILITY,
    event_type::NAME,
    event_type::TOPIC,
    event_type::AVATAR,
    event_type::CANONICAL_ALIAS,
];

/// A minimal Matrix event: just the fields the directory engine needs.
///
/// Every field except `type` is optional on the wire in at least one of the
/// contexts we receive events from, so everything defaults leniently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixEvent {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    #[serde(default)]
    pub content: Value,
}

impl MatrixEvent {
    /// Read a string field out of the event content.
    ///
    /// Returns `None` when the key is absent or not a string; extraction
    /// never errors.
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// True when this is a state event with the empty state key (the
    /// room-level singleton slot for its type).
    pub fn has_empty_state_key(&self) -> bool {
        self.state_key.as_deref() == Some("")
    }
}

/// One publishable room, in the shape the federation `publicRooms` response
/// and the client hierarchy response both use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicRoomEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub canonical_alias: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, rename = "num_joined_members")]
    pub joined_count: i64,
    pub room_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topic: String,
    #[serde(default)]
    pub world_readable: bool,
    #[serde(default, rename = "guest_can_join")]
    pub guests_can_join: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub join_rule: String,
    #[serde(default)]
    pub room_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub avatar_url: String,
    #[serde(default)]
    pub children_state: Vec<StrippedChildEvent>,
}

/// Stripped `m.space.child` state carried inside hierarchy entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrippedChildEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state_key: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub origin_server_ts: i64,
    #[serde(default)]
    pub content: Value,
}
