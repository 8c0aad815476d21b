use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::{
    Row, Sqlite,
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow},
};
use std::collections::HashMap;

use crate::db::{RoomStore, decode_timestamp, encode_timestamp};
use crate::error::StoreError;
use crate::models::{PositionMap, Room, RoomSummary};

/// Layout version written by this build. Bump when the tables change.
pub const SCHEMA_VERSION: i64 = 1;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let mut options = SqlitePoolOptions::new().max_connections(max_connections);
        // An in-memory database vanishes with its last connection.
        if db_url.contains(":memory:") {
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(db_url).await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    // Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        let found: Option<i64> = sqlx::query("SELECT MAX(version) AS version FROM schema_version")
            .fetch_one(pool)
            .await?
            .get("version");

        match found {
            Some(version) if version > SCHEMA_VERSION => {
                return Err(StoreError::UnsupportedSchema {
                    found: version,
                    supported: SCHEMA_VERSION,
                });
            }
            Some(version) => debug!("Database schema version {}", version),
            None => {
                sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                    .bind(SCHEMA_VERSION)
                    .execute(pool)
                    .await?;
            }
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rooms (
                room_code TEXT PRIMARY KEY,
                available_options TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_updated TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                room_code TEXT NOT NULL,
                participant_id TEXT NOT NULL,
                positions TEXT NOT NULL,
                submitted_at TEXT NOT NULL,
                PRIMARY KEY (room_code, participant_id),
                FOREIGN KEY (room_code) REFERENCES rooms(room_code) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rooms_last_updated ON rooms (last_updated)")
            .execute(pool)
            .await?;

        Ok(())
    }

    fn summary_from_row(row: &SqliteRow) -> Result<RoomSummary, StoreError> {
        Ok(RoomSummary {
            code: row.get::<String, _>("room_code"),
            options: serde_json::from_str(&row.get::<String, _>("available_options"))?,
            participants: row.get::<i64, _>("participants").max(0) as usize,
            created_at: decode_timestamp(&row.get::<String, _>("created_at"))?,
            last_updated: decode_timestamp(&row.get::<String, _>("last_updated"))?,
        })
    }
}

#[async_trait]
impl RoomStore for Database {
    async fn insert_room(&self, room: &Room) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO rooms (room_code, available_options, created_at, last_updated)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(room_code) DO NOTHING
            "#,
        )
        .bind(&room.code)
        .bind(serde_json::to_string(&room.options)?)
        .bind(encode_timestamp(room.created_at))
        .bind(encode_timestamp(room.last_updated))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Ok(false);
        }

        for (participant, positions) in &room.votes {
            sqlx::query(
                r#"
                INSERT INTO votes (room_code, participant_id, positions, submitted_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&room.code)
            .bind(participant)
            .bind(serde_json::to_string(positions)?)
            .bind(encode_timestamp(room.last_updated))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn get_room(&self, code: &str) -> Result<Option<Room>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT room_code, available_options, created_at, last_updated
            FROM rooms
            WHERE room_code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Room {
            code: row.get::<String, _>("room_code"),
            options: serde_json::from_str(&row.get::<String, _>("available_options"))?,
            votes: self.get_votes(code).await?,
            created_at: decode_timestamp(&row.get::<String, _>("created_at"))?,
            last_updated: decode_timestamp(&row.get::<String, _>("last_updated"))?,
        }))
    }

    async fn room_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(sqlx::query("SELECT 1 FROM rooms WHERE room_code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .is_some())
    }

    async fn list_rooms(&self) -> Result<Vec<RoomSummary>, StoreError> {
        sqlx::query(
            r#"
            SELECT r.room_code, r.available_options, r.created_at, r.last_updated,
                   COUNT(v.participant_id) AS participants
            FROM rooms r
            LEFT JOIN votes v ON v.room_code = r.room_code
            GROUP BY r.room_code
            ORDER BY r.last_updated DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(Self::summary_from_row)
        .collect()
    }

    async fn room_count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM rooms")
            .fetch_one(&self.pool)
            .await?
            .get("count");
        Ok(count.max(0) as usize)
    }

    async fn update_options(
        &self,
        code: &str,
        options: &[String],
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE rooms
            SET available_options = ?, last_updated = ?
            WHERE room_code = ?
            "#,
        )
        .bind(serde_json::to_string(options)?)
        .bind(encode_timestamp(now))
        .bind(code)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn upsert_vote(
        &self,
        code: &str,
        participant: &str,
        positions: &PositionMap,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let positions = serde_json::to_string(positions)?;
        let now = encode_timestamp(now);
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE rooms SET last_updated = ? WHERE room_code = ?")
            .bind(&now)
            .bind(code)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if touched == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO votes (room_code, participant_id, positions, submitted_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(room_code, participant_id)
            DO UPDATE SET positions = excluded.positions, submitted_at = excluded.submitted_at
            "#,
        )
        .bind(code)
        .bind(participant)
        .bind(&positions)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_vote(
        &self,
        code: &str,
        participant: &str,
    ) -> Result<Option<PositionMap>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT positions
            FROM votes
            WHERE room_code = ? AND participant_id = ?
            "#,
        )
        .bind(code)
        .bind(participant)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.get::<String, _>("positions"))?)),
            None => Ok(None),
        }
    }

    async fn get_votes(&self, code: &str) -> Result<HashMap<String, PositionMap>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT participant_id, positions
            FROM votes
            WHERE room_code = ?
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;

        let mut votes = HashMap::with_capacity(rows.len());
        for row in rows {
            let positions: PositionMap = serde_json::from_str(&row.get::<String, _>("positions"))?;
            votes.insert(row.get::<String, _>("participant_id"), positions);
        }
        Ok(votes)
    }

    async fn delete_vote(&self, code: &str, participant: &str) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM votes WHERE room_code = ? AND participant_id = ?")
            .bind(code)
            .bind(participant)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn delete_room(&self, code: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM votes WHERE room_code = ?")
            .bind(code)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM rooms WHERE room_code = ?")
            .bind(code)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn delete_idle_rooms(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let expired: Vec<String> = sqlx::query(
            r#"
            SELECT room_code
            FROM rooms
            WHERE last_updated < ?
            ORDER BY room_code
            "#,
        )
        .bind(encode_timestamp(cutoff))
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("room_code"))
        .collect();

        for code in &expired {
            sqlx::query("DELETE FROM votes WHERE room_code = ?")
                .bind(code)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM rooms WHERE room_code = ?")
                .bind(code)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(expired)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
