//! Room repository for directory store queries.

use super::models::RoomRecord;
use crate::db::DbError;
use sqlx::SqlitePool;

/// Repository for the `listed_rooms` table.
///
/// Each operation is individually atomic at the storage layer; the engine
/// never composes them into multi-row transactions.
pub struct RoomRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoomRepository<'a> {
    /// Create a new room repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a room or fully replace all mutable fields of an existing row.
    pub async fn upsert(&self, record: &RoomRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO listed_rooms
                (room_id, canonical_alias, name, topic, avatar_url, joined_count, world_readable, guests_can_join)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (room_id) DO UPDATE SET
                canonical_alias = excluded.canonical_alias,
                name = excluded.name,
                topic = excluded.topic,
                avatar_url = excluded.avatar_url,
                joined_count = excluded.joined_count,
                world_readable = excluded.world_readable,
                guests_can_join = excluded.guests_can_join
            "#,
        )
        .bind(&record.room_id)
        .bind(&record.canonical_alias)
        .bind(&record.name)
        .bind(&record.topic)
        .bind(&record.avatar_url)
        .bind(record.joined_count)
        .bind(record.world_readable)
        .bind(record.guests_can_join)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete a room's row if present. Deleting an absent row is not an error.
    pub async fn delete(&self, room_id: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM listed_rooms WHERE room_id = ?")
            .bind(room_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// All current rows, in unspecified persisted order.
    pub async fn list_all(&self) -> Result<Vec<RoomRecord>, DbError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, i64, bool, bool)>(
            r#"
            SELECT room_id, canonical_alias, name, topic, avatar_url, joined_count, world_readable, guests_can_join
            FROM listed_rooms
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    room_id,
                    canonical_alias,
                    name,
                    topic,
                    avatar_url,
                    joined_count,
                    world_readable,
                    guests_can_join,
                )| RoomRecord {
                    room_id,
                    canonical_alias,
                    name,
                    topic,
                    avatar_url,
                    joined_count,
                    world_readable,
                    guests_can_join,
                },
            )
            .collect())
    }
}
