//! Matrix homeserver client for the directory appservice.
//!
//! The engine only needs the logical contracts of a handful of client-server
//! API calls, so they live behind the [`Homeserver`] trait; the reqwest-backed
//! [`HttpHomeserver`] is the production implementation and tests substitute
//! their own.

mod client;
mod events;

pub use client::HttpHomeserver;
pub use events::{
    DIRECTORY_EVENT_TYPES, MatrixEvent, PublicRoomEntry, StrippedChildEvent, event_type,
};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from outbound homeserver calls.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("homeserver request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("homeserver returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// The outbound homeserver calls the directory engine depends on.
///
/// Each call is a simple request/response; no streaming, no retries here.
#[async_trait]
pub trait Homeserver: Send + Sync {
    /// `GET /account/whoami` - the appservice agent's own user id.
    async fn whoami(&self) -> Result<String, MatrixError>;

    /// `POST /join/{roomIdOrAlias}` - returns the joined room id.
    async fn join_room(&self, room_id_or_alias: &str) -> Result<String, MatrixError>;

    /// Resolve a room alias to a room id. Room ids pass through unchanged.
    async fn resolve_room(&self, room_id_or_alias: &str) -> Result<String, MatrixError>;

    /// `GET /rooms/{roomId}/state` - the full current state-event set.
    async fn room_state(&self, room_id: &str) -> Result<Vec<MatrixEvent>, MatrixError>;

    /// `GET /rooms/{roomId}/hierarchy` - all descendant rooms of a space,
    /// including the space itself.
    async fn hierarchy(&self, room_id: &str) -> Result<Vec<PublicRoomEntry>, MatrixError>;

    /// Send an `m.notice` message into a room.
    async fn send_notice(&self, room_id: &str, body: &str) -> Result<(), MatrixError>;

    /// Send an `m.reaction` annotation on an event.
    async fn send_reaction(
        &self,
        room_id: &str,
        event_id: &str,
        key: &str,
    ) -> Result<(), MatrixError>;
}
