//! Room state aggregation.
//!
//! A single pass over a room's full state-event set produces the normalized
//! attribute bundle the directory stores, plus the viability verdict. Field
//! extraction is fail-soft throughout: an absent or malformed content field
//! degrades to the field's zero value and never aborts the scan.

use crate::matrix::{MatrixEvent, event_type};

/// Normalized room attributes extracted from state events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomAttributes {
    pub canonical_alias: String,
    pub name: String,
    pub topic: String,
    pub avatar_url: String,
    pub joined_count: i64,
    pub world_readable: bool,
    pub guests_can_join: bool,
    pub is_public: bool,
}

impl RoomAttributes {
    /// A room is viable for listing iff it is public, has a canonical alias,
    /// and has a name. Any single failing condition removes it.
    pub fn viable(&self) -> bool {
        self.is_public && !self.canonical_alias.is_empty() && !self.name.is_empty()
    }
}

/// Scan the state-event set once and extract directory attributes.
///
/// Singleton state (name, topic, join rules, ...) is read from events with
/// the empty state key; membership events (state key = user id) contribute
/// to the joined count when membership is `join`. State events are already
/// deduplicated by (type, state_key) upstream, so no further de-duplication
/// happens here.
pub fn aggregate(state: &[MatrixEvent]) -> RoomAttributes {
    let mut attrs = RoomAttributes::default();

    for ev in state {
        if ev.has_empty_state_key() {
            match ev.kind.as_str() {
                event_type::NAME => {
                    attrs.name = ev.content_str("name").unwrap_or_default().to_string();
                }
                event_type::AVATAR => {
                    attrs.avatar_url = ev.content_str("url").unwrap_or_default().to_string();
                }
                event_type::TOPIC => {
                    attrs.topic = ev.content_str("topic").unwrap_or_default().to_string();
                }
                event_type::HISTORY_VISIBILITY => {
                    attrs.world_readable =
                        ev.content_str("history_visibility") == Some("world_readable");
                }
                event_type::CANONICAL_ALIAS => {
                    attrs.canonical_alias =
                        ev.content_str("alias").unwrap_or_default().to_string();
                }
                event_type::GUEST_ACCESS => {
                    attrs.guests_can_join = ev.content_str("guest_access") == Some("can_join");
                }
                event_type::JOIN_RULES => {
                    attrs.is_public = ev.content_str("join_rule") == Some("public");
                }
                _ => {}
            }
        } else if ev.kind == event_type::MEMBER
            && ev.state_key.is_some()
            && ev.content_str("membership") == Some("join")
        {
            attrs.joined_count += 1;
        }
    }

    attrs
}
