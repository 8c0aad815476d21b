use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::db::RoomStore;
use crate::error::StoreError;
use crate::models::{PositionMap, Room, RoomSummary};

/// Keeps rooms in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, Room>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn insert_room(&self, room: &Room) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.code) {
            return Ok(false);
        }
        rooms.insert(room.code.clone(), room.clone());
        Ok(true)
    }

    async fn get_room(&self, code: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.read().await.get(code).cloned())
    }

    async fn room_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.rooms.read().await.contains_key(code))
    }

    async fn list_rooms(&self) -> Result<Vec<RoomSummary>, StoreError> {
        let mut summaries: Vec<RoomSummary> =
            self.rooms.read().await.values().map(Room::summary).collect();
        summaries.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(summaries)
    }

    async fn room_count(&self) -> Result<usize, StoreError> {
        Ok(self.rooms.read().await.len())
    }

    async fn update_options(
        &self,
        code: &str,
        options: &[String],
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(code) {
            Some(room) => {
                room.options = options.to_vec();
                room.last_updated = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_vote(
        &self,
        code: &str,
        participant: &str,
        positions: &PositionMap,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(code) {
            Some(room) => {
                room.votes.insert(participant.to_string(), positions.clone());
                room.last_updated = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_vote(
        &self,
        code: &str,
        participant: &str,
    ) -> Result<Option<PositionMap>, StoreError> {
        Ok(self
            .rooms
            .read()
            .await
            .get(code)
            .and_then(|room| room.votes.get(participant).cloned()))
    }

    async fn get_votes(&self, code: &str) -> Result<HashMap<String, PositionMap>, StoreError> {
        Ok(self
            .rooms
            .read()
            .await
            .get(code)
            .map(|room| room.votes.clone())
            .unwrap_or_default())
    }

    async fn delete_vote(&self, code: &str, participant: &str) -> Result<bool, StoreError> {
        let mut rooms = self.rooms.write().await;
        Ok(rooms
            .get_mut(code)
            .map(|room| room.votes.remove(participant).is_some())
            .unwrap_or(false))
    }

    async fn delete_room(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.rooms.write().await.remove(code).is_some())
    }

    async fn delete_idle_rooms(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let mut rooms = self.rooms.write().await;
        let mut expired: Vec<String> = rooms
            .values()
            .filter(|room| room.idle_before(cutoff))
            .map(|room| room.code.clone())
            .collect();
        expired.sort();
        for code in &expired {
            rooms.remove(code);
        }
        Ok(expired)
    }

    async fn close(&self) {}
}
