pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

use crate::error::StoreError;
use crate::models::{PositionMap, Room, RoomSummary};

pub use memory::MemoryStore;
pub use sqlite::Database;

/// Durable home of rooms and their per-participant votes.
///
/// Room codes passed in are already normalised. Writes to an unknown room report
/// `false` (or `None`) rather than an error; the manager turns that into
/// `StoreError::RoomNotFound`.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Inserts a fresh room. Returns `false` when the code is already taken.
    async fn insert_room(&self, room: &Room) -> Result<bool, StoreError>;

    async fn get_room(&self, code: &str) -> Result<Option<Room>, StoreError>;

    async fn room_exists(&self, code: &str) -> Result<bool, StoreError>;

    async fn list_rooms(&self) -> Result<Vec<RoomSummary>, StoreError>;

    async fn room_count(&self) -> Result<usize, StoreError>;

    async fn update_options(
        &self,
        code: &str,
        options: &[String],
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Stores a participant's vote, replacing any earlier one, and touches the room.
    async fn upsert_vote(
        &self,
        code: &str,
        participant: &str,
        positions: &PositionMap,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn get_vote(
        &self,
        code: &str,
        participant: &str,
    ) -> Result<Option<PositionMap>, StoreError>;

    async fn get_votes(&self, code: &str) -> Result<HashMap<String, PositionMap>, StoreError>;

    async fn delete_vote(&self, code: &str, participant: &str) -> Result<bool, StoreError>;

    /// Deletes a room and all of its votes.
    async fn delete_room(&self, code: &str) -> Result<bool, StoreError>;

    /// Deletes every room last updated before `cutoff`, returning the removed codes.
    async fn delete_idle_rooms(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError>;

    async fn close(&self);
}

// Fixed width so stored timestamps sort lexicographically.
pub(crate) fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| StoreError::Timestamp {
            value: value.to_string(),
            source,
        })
}
