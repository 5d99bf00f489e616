//! Appservice event processor.
//!
//! A state-free dispatcher over inbound transaction events. Admin invites
//! are auto-joined, admin text messages are parsed as `!directory` commands,
//! and directory-relevant state events trigger a room update when the room
//! is already known to the store. Command outcomes are acknowledged with a
//! reaction emoji on the triggering event.

use crate::directory::snapshot::SnapshotCache;
use crate::directory::{Directory, DirectoryError};
use crate::matrix::{DIRECTORY_EVENT_TYPES, Homeserver, MatrixEvent, event_type};
use std::sync::Arc;
use tracing::info;

const REACTION_OK: &str = "\u{2714}";
const REACTION_FAILED: &str = "\u{274C}";
const REACTION_UNKNOWN: &str = "\u{2753}";

const CMD_ADD: &str = "!directory add ";
const CMD_REFRESH: &str = "!directory refresh";

/// Per-event processing failure surfaced to the transaction handler.
///
/// These never abort the batch; the handler logs them, keeps going, and
/// reports overall failure if any event failed.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("failed to join room {room_id}: {source}")]
    Join {
        room_id: String,
        source: crate::matrix::MatrixError,
    },
    #[error("directory update failed: {0}")]
    Update(#[from] DirectoryError),
    #[error("snapshot refresh failed: {0}")]
    Refresh(DirectoryError),
    #[error(transparent)]
    Db(#[from] crate::db::DbError),
}

/// Routes inbound events to directory updates and admin commands.
pub struct Processor {
    homeserver: Arc<dyn Homeserver>,
    snapshot: Arc<SnapshotCache>,
    /// The identity whose invites and commands are honored.
    admin_user: String,
    /// The appservice agent's own user id, learned via whoami at startup.
    agent_user_id: String,
}

impl Processor {
    pub fn new(
        homeserver: Arc<dyn Homeserver>,
        snapshot: Arc<SnapshotCache>,
        admin_user: impl Into<String>,
        agent_user_id: impl Into<String>,
    ) -> Self {
        Self {
            homeserver,
            snapshot,
            admin_user: admin_user.into(),
            agent_user_id: agent_user_id.into(),
        }
    }

    /// Process one inbound event against the directory.
    ///
    /// The caller holds the directory lock for the whole batch, so index
    /// reads here are never stale relative to mutations earlier in the batch.
    pub async fn process_event(
        &self,
        directory: &mut Directory,
        ev: &MatrixEvent,
    ) -> Result<(), ProcessorError> {
        if ev.content.is_null() {
            return Ok(());
        }

        if self.is_admin_invite(ev) {
            info!(room_id = %ev.room_id, "Received invite from admin");
            return match self.homeserver.join_room(&ev.room_id).await {
                Ok(_) => Ok(()),
                Err(source) => Err(ProcessorError::Join {
                    room_id: ev.room_id.clone(),
                    source,
                }),
            };
        }

        if self.is_admin_text(ev) {
            let body = ev.content_str("body").unwrap_or_default().trim();
            return self.run_command(directory, ev, body).await;
        }

        if DIRECTORY_EVENT_TYPES.contains(&ev.kind.as_str()) {
            // Rooms never attached to the directory are skipped entirely.
            if !directory.contains(&ev.room_id).await? {
                return Ok(());
            }

            directory.update_room(&ev.room_id).await?;
            self.react(ev, REACTION_OK).await;
            return Ok(());
        }

        Ok(())
    }

    async fn run_command(
        &self,
        directory: &mut Directory,
        ev: &MatrixEvent,
        command: &str,
    ) -> Result<(), ProcessorError> {
        if let Some(target) = command.strip_prefix(CMD_ADD) {
            info!(target = %target, "Admin requested directory add");
            directory.invalidate();
            match directory.add_room(target.trim()).await {
                Ok(_) => {
                    self.react(ev, REACTION_OK).await;
                    Ok(())
                }
                Err(e) => {
                    self.react(ev, REACTION_FAILED).await;
                    Err(ProcessorError::Update(e))
                }
            }
        } else if command == CMD_REFRESH {
            info!("Admin requested snapshot refresh");
            match self.snapshot.refresh().await {
                Ok(count) => {
                    info!(rooms = count, "Snapshot refreshed on request");
                    self.react(ev, REACTION_OK).await;
                    Ok(())
                }
                Err(e) => {
                    self.react(ev, REACTION_FAILED).await;
                    Err(ProcessorError::Refresh(e))
                }
            }
        } else {
            self.react(ev, REACTION_UNKNOWN).await;
            Ok(())
        }
    }

    fn is_admin_invite(&self, ev: &MatrixEvent) -> bool {
        ev.kind == event_type::MEMBER
            && ev.state_key.as_deref() == Some(self.agent_user_id.as_str())
            && ev.sender == self.admin_user
            && ev.content_str("membership") == Some("invite")
    }

    fn is_admin_text(&self, ev: &MatrixEvent) -> bool {
        ev.kind == event_type::MESSAGE
            && ev.sender == self.admin_user
            && ev.content_str("msgtype") == Some("m.text")
    }

    /// Best-effort reaction; a failed acknowledgement is logged, never fatal.
    async fn react(&self, ev: &MatrixEvent, key: &str) {
        if let Err(e) = self
            .homeserver
            .send_reaction(&ev.room_id, &ev.event_id, key)
            .await
        {
            tracing::warn!(room_id = %ev.room_id, error = %e, "Failed to send reaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::directory::snapshot::RefreshMode;
    use crate::directory::testing::{FakeHomeserver, viable_state};
    use serde_json::json;

    struct Fixture {
        hs: Arc<FakeHomeserver>,
        directory: Directory,
        processor: Processor,
    }

    async fn setup() -> Fixture {
        let db = Database::new(":memory:").await.expect("db setup");
        let hs = Arc::new(FakeHomeserver::default());
        let snapshot = Arc::new(SnapshotCache::new(
            db.clone(),
            hs.clone(),
            "!space:example.org",
            RefreshMode::Store,
        ));
        let directory = Directory::new(db, hs.clone());
        let processor = Processor::new(
            hs.clone(),
            snapshot,
            "@admin:example.org",
            "@directory:example.org",
        );
        Fixture {
            hs,
            directory,
            processor,
        }
    }

    fn admin_message(body: &str) -> MatrixEvent {
        serde_json::from_value(json!({
            "event_id": "$cmd",
            "room_id": "!control:example.org",
            "type": "m.room.message",
            "sender": "@admin:example.org",
            "content": {"msgtype": "m.text", "body": body},
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn admin_invite_is_joined() {
        let mut f = setup().await;
        let ev: MatrixEvent = serde_json::from_value(json!({
            "event_id": "$invite",
            "room_id": "!new:example.org",
            "type": "m.room.member",
            "sender": "@admin:example.org",
            "state_key": "@directory:example.org",
            "content": {"membership": "invite"},
        }))
        .unwrap();

        f.processor
            .process_event(&mut f.directory, &ev)
            .await
            .expect("invite handled");
        assert_eq!(f.hs.joined.lock().unwrap().as_slice(), ["!new:example.org"]);
    }

    #[tokio::test]
    async fn invite_from_non_admin_is_ignored() {
        let mut f = setup().await;
        let ev: MatrixEvent = serde_json::from_value(json!({
            "event_id": "$invite",
            "room_id": "!new:example.org",
            "type": "m.room.member",
            "sender": "@stranger:example.org",
            "state_key": "@directory:example.org",
            "content": {"membership": "invite"},
        }))
        .unwrap();

        f.processor
            .process_event(&mut f.directory, &ev)
            .await
            .expect("ignored");
        assert!(f.hs.joined.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn directory_add_joins_stores_and_acknowledges() {
        let mut f = setup().await;
        f.hs.aliases
            .lock()
            .unwrap()
            .insert("#foo:example.org".to_string(), "!foo:example.org".to_string());
        f.hs.set_state(
            "!foo:example.org",
            viable_state("#foo:example.org", "Foo", 4),
        );

        f.processor
            .process_event(&mut f.directory, &admin_message("!directory add #foo:example.org"))
            .await
            .expect("add succeeds");

        let rooms = f.directory.database().rooms().list_all().await.expect("list");
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].room_id, "!foo:example.org");
        assert_eq!(f.hs.last_reaction_key().as_deref(), Some(REACTION_OK));
    }

    #[tokio::test]
    async fn failed_add_reacts_with_failure_marker() {
        let mut f = setup().await;
        *f.hs.fail_joins.lock().unwrap() = true;

        let err = f
            .processor
            .process_event(&mut f.directory, &admin_message("!directory add #gone:example.org"))
            .await;

        assert!(err.is_err());
        assert_eq!(f.hs.last_reaction_key().as_deref(), Some(REACTION_FAILED));
    }

    #[tokio::test]
    async fn unrecognized_admin_text_gets_question_mark() {
        let mut f = setup().await;

        f.processor
            .process_event(&mut f.directory, &admin_message("!directory help"))
            .await
            .expect("unrecognized text is not a failure");

        assert_eq!(f.hs.last_reaction_key().as_deref(), Some(REACTION_UNKNOWN));
    }

    #[tokio::test]
    async fn text_from_non_admin_is_not_a_command() {
        let mut f = setup().await;
        let ev: MatrixEvent = serde_json::from_value(json!({
            "event_id": "$msg",
            "room_id": "!control:example.org",
            "type": "m.room.message",
            "sender": "@stranger:example.org",
            "content": {"msgtype": "m.text", "body": "!directory add #foo:example.org"},
        }))
        .unwrap();

        f.processor
            .process_event(&mut f.directory, &ev)
            .await
            .expect("ignored");
        assert!(f.hs.reactions.lock().unwrap().is_empty());
        assert!(f.hs.joined.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn state_event_for_known_room_triggers_update() {
        let mut f = setup().await;
        f.hs.set_state("!foo:example.org", viable_state("#foo:example.org", "Foo", 1));
        f.directory.update_room("!foo:example.org").await.expect("seed");

        // The room gains members; a member event arrives.
        f.hs.set_state("!foo:example.org", viable_state("#foo:example.org", "Foo", 5));
        let ev: MatrixEvent = serde_json::from_value(json!({
            "event_id": "$member",
            "room_id": "!foo:example.org",
            "type": "m.room.member",
            "sender": "@user4:example.org",
            "state_key": "@user4:example.org",
            "content": {"membership": "join"},
        }))
        .unwrap();

        f.processor
            .process_event(&mut f.directory, &ev)
            .await
            .expect("update");

        let rooms = f.directory.database().rooms().list_all().await.expect("list");
        assert_eq!(rooms[0].joined_count, 5);
        assert_eq!(f.hs.last_reaction_key().as_deref(), Some(REACTION_OK));
    }

    #[tokio::test]
    async fn state_event_for_unknown_room_is_skipped() {
        let mut f = setup().await;
        let ev: MatrixEvent = serde_json::from_value(json!({
            "event_id": "$name",
            "room_id": "!unknown:example.org",
            "type": "m.room.name",
            "sender": "@someone:example.org",
            "state_key": "",
            "content": {"name": "Whatever"},
        }))
        .unwrap();

        f.processor
            .process_event(&mut f.directory, &ev)
            .await
            .expect("skipped");
        assert!(f.hs.reactions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_command_rebuilds_the_snapshot() {
        let mut f = setup().await;
        f.hs.set_state("!foo:example.org", viable_state("#foo:example.org", "Foo", 2));
        f.directory.update_room("!foo:example.org").await.expect("seed");
        assert!(f.processor.snapshot.current().is_empty());

        f.processor
            .process_event(&mut f.directory, &admin_message("!directory refresh"))
            .await
            .expect("refresh");

        assert_eq!(f.processor.snapshot.current().len(), 1);
        assert_eq!(f.hs.last_reaction_key().as_deref(), Some(REACTION_OK));
    }
}
