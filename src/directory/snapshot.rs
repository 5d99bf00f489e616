//! In-memory snapshot of publishable rooms.
//!
//! The snapshot is read on every publication request and written only by
//! refreshes, so it lives behind an `ArcSwap`: readers load a plain `Arc`
//! with no lock, and a refresh replaces the whole list in one atomic swap.
//! No reader ever observes a half-built list.

use super::DirectoryError;
use crate::db::Database;
use crate::matrix::{Homeserver, PublicRoomEntry};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Where a refresh sources its entries from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// `list()` on the directory store, storage order.
    Store,
    /// Live hierarchy query on the configured space, sorted by descending
    /// joined count (ties keep retrieval order).
    Hierarchy,
}

/// The snapshot cache and its refresh machinery.
pub struct SnapshotCache {
    entries: ArcSwap<Vec<PublicRoomEntry>>,
    db: Database,
    homeserver: Arc<dyn Homeserver>,
    space_id: String,
    mode: RefreshMode,
}

impl SnapshotCache {
    pub fn new(
        db: Database,
        homeserver: Arc<dyn Homeserver>,
        space_id: impl Into<String>,
        mode: RefreshMode,
    ) -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            db,
            homeserver,
            space_id: space_id.into(),
            mode,
        }
    }

    /// The current snapshot. Cheap; safe to call concurrently with a swap.
    pub fn current(&self) -> Arc<Vec<PublicRoomEntry>> {
        self.entries.load_full()
    }

    /// Rebuild the snapshot from the configured source and swap it in.
    ///
    /// On failure the existing snapshot is left untouched; the caller
    /// decides whether the error is fatal (startup) or just logged (timer).
    pub async fn refresh(&self) -> Result<usize, DirectoryError> {
        let entries = match self.mode {
            RefreshMode::Store => {
                let rooms = self.db.rooms().list_all().await?;
                rooms.iter().map(|r| r.to_public_entry()).collect()
            }
            RefreshMode::Hierarchy => {
                let mut rooms = self.homeserver.hierarchy(&self.space_id).await?;
                // The space itself is the container, not a listing.
                rooms.retain(|r| r.room_id != self.space_id);
                // Stable sort keeps retrieval order for equal counts.
                rooms.sort_by(|a, b| b.joined_count.cmp(&a.joined_count));
                rooms
            }
        };

        let count = entries.len();
        self.entries.store(Arc::new(entries));
        crate::metrics::record_snapshot(count);
        Ok(count)
    }

    /// Spawn the periodic refresh task.
    ///
    /// The task refreshes every `interval` until `shutdown` is cancelled.
    /// Cancelling before the first tick is fine; shutdown completes when the
    /// returned handle resolves, after any in-flight refresh has finished.
    pub fn spawn_refresh_loop(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; the startup refresh already ran.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Snapshot refresh loop stopping");
                        return;
                    }
                    _ = ticker.tick() => {
                        match cache.refresh().await {
                            Ok(count) => info!(rooms = count, "Snapshot refreshed"),
                            Err(e) => {
                                // Stale-but-available beats unavailable.
                                error!(error = %e, "Snapshot refresh failed; keeping previous snapshot");
                                crate::metrics::record_snapshot_failure();
                            }
                        }
                    }
                }
            }
        })
    }
}
