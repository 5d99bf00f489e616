//! Directory store models.

use crate::matrix::PublicRoomEntry;

/// One directory-eligible room.
///
/// A row exists in `listed_rooms` iff the room was most recently observed as
/// viable. All string fields default to empty rather than NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub room_id: String,
    pub canonical_alias: String,
    pub name: String,
    pub topic: String,
    pub avatar_url: String,
    pub joined_count: i64,
    pub world_readable: bool,
    pub guests_can_join: bool,
}

impl RoomRecord {
    /// Project the stored record into its publication-facing shape.
    ///
    /// Stored rooms are public by definition (a private room would have been
    /// evicted), so `join_rule` is fixed; store-sourced entries carry no
    /// children state.
    pub fn to_public_entry(&self) -> PublicRoomEntry {
        PublicRoomEntry {
            canonical_alias: self.canonical_alias.clone(),
            name: self.name.clone(),
            joined_count: self.joined_count,
            room_id: self.room_id.clone(),
            topic: self.topic.clone(),
            world_readable: self.world_readable,
            guests_can_join: self.guests_can_join,
            join_rule: "public".to_string(),
            room_type: String::new(),
            avatar_url: self.avatar_url.clone(),
            children_state: Vec::new(),
        }
    }
}
