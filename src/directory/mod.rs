//! Directory maintenance: eligibility decisions, the persistent store of
//! listed rooms, and the known-rooms index.
//!
//! The [`Directory`] owns every mutation of the store. Callers serialize
//! through a single `tokio::sync::Mutex<Directory>` (held per transaction
//! batch), which also protects the known-rooms index from being read stale
//! relative to a store mutation the same batch just performed.

mod aggregate;
pub mod pagination;
pub mod snapshot;

pub use aggregate::{RoomAttributes, aggregate};

use crate::db::{Database, DbError, RoomRecord};
use crate::matrix::{Homeserver, MatrixError};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Notice sent into a room when it falls out of the directory.
const REMOVAL_NOTICE: &str =
    "This room has been removed from the directory because it is now private";

/// Errors from directory maintenance operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Lazy cache of "which rooms are currently in the store".
///
/// `Unbuilt` means the next membership query must rebuild from the store;
/// `Built` with an empty set means the store really is empty. Conflating the
/// two is the ambiguity this tri-state exists to avoid.
#[derive(Debug, Default)]
enum KnownRooms {
    #[default]
    Unbuilt,
    Built(HashSet<String>),
}

/// The directory maintenance service.
pub struct Directory {
    db: Database,
    homeserver: Arc<dyn Homeserver>,
    known: KnownRooms,
}

impl Directory {
    pub fn new(db: Database, homeserver: Arc<dyn Homeserver>) -> Self {
        Self {
            db,
            homeserver,
            known: KnownRooms::Unbuilt,
        }
    }

    /// Join a room by id or alias and attach it to the directory.
    ///
    /// Returns the resolved room id. The room still has to pass the
    /// viability gate inside [`Self::update_room`] to actually be listed.
    pub async fn add_room(&mut self, room_id_or_alias: &str) -> Result<String, DirectoryError> {
        let room_id = self.homeserver.join_room(room_id_or_alias).await?;
        self.update_room(&room_id).await?;
        Ok(room_id)
    }

    /// Recompute a room's directory eligibility from its full current state.
    ///
    /// Viable rooms are upserted; non-viable rooms are evicted, with a
    /// user-visible notice sent into the room. The known-rooms index is
    /// invalidated only after the store operation succeeds.
    pub async fn update_room(&mut self, room_id: &str) -> Result<(), DirectoryError> {
        info!(room_id = %room_id, "Updating room");

        let state = self.homeserver.room_state(room_id).await?;
        let attrs = aggregate(&state);

        if !attrs.viable() {
            info!(room_id = %room_id, "Removing room from directory: no longer viable");
            if let Err(e) = self.homeserver.send_notice(room_id, REMOVAL_NOTICE).await {
                tracing::warn!(room_id = %room_id, error = %e, "Failed to send removal notice");
            }
            self.db.rooms().delete(room_id).await?;
            crate::metrics::record_eviction();
            self.invalidate();
            return Ok(());
        }

        let record = RoomRecord {
            room_id: room_id.to_string(),
            canonical_alias: attrs.canonical_alias,
            name: attrs.name,
            topic: attrs.topic,
            avatar_url: attrs.avatar_url,
            joined_count: attrs.joined_count,
            world_readable: attrs.world_readable,
            guests_can_join: attrs.guests_can_join,
        };
        self.db.rooms().upsert(&record).await?;
        crate::metrics::record_upsert();
        self.invalidate();
        Ok(())
    }

    /// Is this room currently in the directory store?
    ///
    /// Rebuilds the index from the store first when it is invalidated.
    pub async fn contains(&mut self, room_id: &str) -> Result<bool, DbError> {
        if let KnownRooms::Unbuilt = self.known {
            let rooms = self.db.rooms().list_all().await?;
            self.known = KnownRooms::Built(rooms.into_iter().map(|r| r.room_id).collect());
        }

        match &self.known {
            KnownRooms::Built(ids) => Ok(ids.contains(room_id)),
            KnownRooms::Unbuilt => unreachable!("index was just built"),
        }
    }

    /// Drop the known-rooms index; the next membership query rebuilds it.
    pub fn invalidate(&mut self) {
        self.known = KnownRooms::Unbuilt;
    }

    /// The store handle, for snapshot refreshes.
    pub fn database(&self) -> &Database {
        &self.db
    }
}
