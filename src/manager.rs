use chrono::{DateTime, Utc};
use log::{debug, info};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{Database, RoomStore};
use crate::error::StoreError;
use crate::models::{
    PositionMap, ROOM_CODE_ALPHABET, Room, RoomSummary, default_options, normalize_options,
    normalize_room_code,
};
use crate::voting::{self, Placement, RoomResults};

const MAX_CODE_ATTEMPTS: usize = 32;

/// Entry point for everything a room goes through: creation, votes, results, expiry.
///
/// Built once at startup and shared by reference (or `Arc`) with whatever serves
/// requests.
pub struct RoomManager {
    store: Arc<dyn RoomStore>,
    config: Config,
}

impl RoomManager {
    /// Wraps an already opened store. Does not sweep.
    pub fn new(store: Arc<dyn RoomStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Opens the configured SQLite database and clears out rooms that expired while
    /// nothing was running.
    pub async fn open(config: Config) -> Result<Self, StoreError> {
        let database = Database::connect(&config.database_url, config.max_connections).await?;
        let manager = Self::new(Arc::new(database), config);

        let cleaned = manager.sweep_idle_rooms().await?;
        if cleaned > 0 {
            info!("Cleaned up {} expired room(s) on startup", cleaned);
        }
        Ok(manager)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a room with a fresh code. Falls back to the default option list when
    /// nothing usable is given.
    pub async fn create_room(&self, options: Option<Vec<String>>) -> Result<Room, StoreError> {
        let options = match options.map(normalize_options) {
            Some(options) if !options.is_empty() => options,
            _ => default_options(),
        };

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_room_code(self.config.room_code_length);
            let room = Room::new(code, options.clone(), Utc::now());
            if self.store.insert_room(&room).await? {
                info!("Created room {} with {} option(s)", room.code, room.options.len());
                return Ok(room);
            }
            debug!("Room code {} already taken, retrying", room.code);
        }
        Err(StoreError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    pub async fn get_room(&self, code: &str) -> Result<Room, StoreError> {
        let code = normalize_room_code(code)?;
        self.store
            .get_room(&code)
            .await?
            .ok_or(StoreError::RoomNotFound(code))
    }

    pub async fn room_exists(&self, code: &str) -> Result<bool, StoreError> {
        match normalize_room_code(code) {
            Ok(code) => self.store.room_exists(&code).await,
            Err(_) => Ok(false),
        }
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>, StoreError> {
        self.store.list_rooms().await
    }

    pub async fn room_count(&self) -> Result<usize, StoreError> {
        self.store.room_count().await
    }

    /// Replaces the room's option list. Stored votes are left as they are, even when
    /// they mention options that are no longer offered.
    pub async fn update_options(
        &self,
        code: &str,
        options: Vec<String>,
    ) -> Result<Vec<String>, StoreError> {
        let code = normalize_room_code(code)?;
        let options = normalize_options(options);
        if self.store.update_options(&code, &options, Utc::now()).await? {
            info!("Room {} now offers {} option(s)", code, options.len());
            Ok(options)
        } else {
            Err(StoreError::RoomNotFound(code))
        }
    }

    /// Records a participant's vote, replacing any earlier one from the same participant.
    /// Invalid positions are rejected before anything is written.
    pub async fn submit_vote(
        &self,
        code: &str,
        participant: &str,
        positions: &PositionMap,
    ) -> Result<(), StoreError> {
        let code = normalize_room_code(code)?;
        let participant = participant.trim();
        if participant.is_empty() {
            return Err(StoreError::EmptyParticipant);
        }
        voting::validate_positions(positions)?;

        if self
            .store
            .upsert_vote(&code, participant, positions, Utc::now())
            .await?
        {
            info!(
                "Stored vote from {} in room {} ({} option(s))",
                participant,
                code,
                positions.len()
            );
            Ok(())
        } else {
            Err(StoreError::RoomNotFound(code))
        }
    }

    pub async fn participant_vote(
        &self,
        code: &str,
        participant: &str,
    ) -> Result<Option<PositionMap>, StoreError> {
        let code = normalize_room_code(code)?;
        self.store.get_vote(&code, participant.trim()).await
    }

    /// Removes a participant's vote. Returns whether there was one.
    pub async fn withdraw_vote(&self, code: &str, participant: &str) -> Result<bool, StoreError> {
        let code = normalize_room_code(code)?;
        if !self.store.room_exists(&code).await? {
            return Err(StoreError::RoomNotFound(code));
        }
        self.store.delete_vote(&code, participant.trim()).await
    }

    pub async fn delete_room(&self, code: &str) -> Result<(), StoreError> {
        let code = normalize_room_code(code)?;
        if self.store.delete_room(&code).await? {
            info!("Deleted room {}", code);
            Ok(())
        } else {
            Err(StoreError::RoomNotFound(code))
        }
    }

    /// Aggregates the room's current votes. Always recomputed from a fresh snapshot.
    pub async fn results(&self, code: &str) -> Result<RoomResults, StoreError> {
        let code = normalize_room_code(code)?;
        if !self.store.room_exists(&code).await? {
            return Err(StoreError::RoomNotFound(code));
        }
        let votes = self.store.get_votes(&code).await?;
        Ok(RoomResults::from_tally(voting::tally(&votes)))
    }

    /// Shares for a set of positions that has not been submitted anywhere.
    pub fn preview(&self, positions: &PositionMap) -> Result<Vec<Placement>, StoreError> {
        Ok(voting::placements(positions)?)
    }

    pub async fn sweep_idle_rooms(&self) -> Result<usize, StoreError> {
        self.sweep_idle_rooms_at(Utc::now()).await
    }

    /// Deletes rooms that have been idle for longer than the configured maximum age at `now`.
    pub async fn sweep_idle_rooms_at(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        // A cutoff before the earliest representable time cannot match any room.
        let Some(cutoff) = now.checked_sub_signed(self.config.room_max_age) else {
            debug!("Room max age reaches past the earliest timestamp, nothing to sweep");
            return Ok(0);
        };
        let expired = self.store.delete_idle_rooms(cutoff).await?;
        for code in &expired {
            debug!("Expired room {}", code);
        }
        Ok(expired.len())
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

/// Random code over `A-Z0-9`, using a v4 UUID as the entropy source.
pub fn generate_room_code(length: usize) -> String {
    let mut code = String::with_capacity(length);
    while code.len() < length {
        for byte in Uuid::new_v4().into_bytes() {
            if code.len() == length {
                break;
            }
            let idx = byte as usize % ROOM_CODE_ALPHABET.len();
            code.push(ROOM_CODE_ALPHABET[idx] as char);
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::VoteError;

    fn memory_manager() -> RoomManager {
        RoomManager::new(Arc::new(MemoryStore::new()), Config::default())
    }

    async fn sqlite_manager() -> RoomManager {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Config::default()
        };
        RoomManager::open(config).await.unwrap()
    }

    fn positions(entries: &[(&str, f64)]) -> PositionMap {
        entries
            .iter()
            .map(|(label, position)| (label.to_string(), *position))
            .collect()
    }

    #[test]
    fn test_generated_codes_have_requested_shape() {
        for length in [4, 6, 12] {
            let code = generate_room_code(length);
            assert_eq!(code.len(), length);
            assert!(normalize_room_code(&code).is_ok(), "{}", code);
        }
    }

    #[tokio::test]
    async fn test_create_room_defaults() {
        let manager = memory_manager();
        let room = manager.create_room(None).await.unwrap();

        assert_eq!(room.code.len(), 6);
        assert!(room.code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(room.options, default_options());
        assert!(manager.room_exists(&room.code).await.unwrap());
        assert_eq!(manager.room_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_room_with_options() {
        let manager = memory_manager();
        let options = vec!["Red".to_string(), " Blue ".to_string(), "Red".to_string()];
        let room = manager.create_room(Some(options)).await.unwrap();
        assert_eq!(room.options, vec!["Red", "Blue"]);

        let blank = manager.create_room(Some(vec!["  ".to_string()])).await.unwrap();
        assert_eq!(blank.options, default_options());
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let manager = memory_manager();
        let room = manager.create_room(None).await.unwrap();
        let lower = format!("  {} ", room.code.to_lowercase());

        assert_eq!(manager.get_room(&lower).await.unwrap().code, room.code);
        assert!(manager.room_exists(&lower).await.unwrap());
        assert!(!manager.room_exists("not a code").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_room_errors() {
        let manager = memory_manager();
        let vote = positions(&[("A", 50.0)]);

        assert!(matches!(
            manager.get_room("NOTEXI").await,
            Err(StoreError::RoomNotFound(_))
        ));
        assert!(matches!(
            manager.submit_vote("NOTEXI", "p1", &vote).await,
            Err(StoreError::RoomNotFound(_))
        ));
        assert!(matches!(
            manager.results("NOTEXI").await,
            Err(StoreError::RoomNotFound(_))
        ));
        assert!(matches!(
            manager.delete_room("NOTEXI").await,
            Err(StoreError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_vote_rejects_invalid_positions() {
        let manager = memory_manager();
        let room = manager.create_room(None).await.unwrap();

        let err = manager
            .submit_vote(&room.code, "p1", &positions(&[("Option A", 150.0)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Vote(VoteError::PositionOutOfRange { .. })
        ));
        assert!(manager.participant_vote(&room.code, "p1").await.unwrap().is_none());

        let err = manager
            .submit_vote(&room.code, "  ", &positions(&[("Option A", 50.0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmptyParticipant));
    }

    #[tokio::test]
    async fn test_participant_updates_vote() {
        let manager = memory_manager();
        let room = manager
            .create_room(Some(vec!["A".into(), "B".into(), "C".into()]))
            .await
            .unwrap();

        manager
            .submit_vote(&room.code, "p1", &positions(&[("A", 0.0), ("B", 100.0)]))
            .await
            .unwrap();
        manager
            .submit_vote(&room.code, "p1", &positions(&[("A", 50.0), ("C", 100.0)]))
            .await
            .unwrap();

        let room = manager.get_room(&room.code).await.unwrap();
        assert_eq!(room.participant_count(), 1);
        assert_eq!(room.votes["p1"], positions(&[("A", 50.0), ("C", 100.0)]));

        let results = manager.results(&room.code).await.unwrap();
        assert_eq!(results.participants, 1);
        assert_eq!(results.points.get("B"), None);
    }

    #[tokio::test]
    async fn test_results_track_latest_votes() {
        let manager = memory_manager();
        let room = manager
            .create_room(Some(vec!["A".into(), "B".into(), "C".into()]))
            .await
            .unwrap();

        for (participant, option) in [("p1", "A"), ("p2", "B"), ("p3", "C")] {
            manager
                .submit_vote(&room.code, participant, &positions(&[(option, 50.0)]))
                .await
                .unwrap();
        }

        let results = manager.results(&room.code).await.unwrap();
        assert_eq!(results.participants, 3);
        assert_eq!(results.points["A"], 100.0);
        assert_eq!(results.points["B"], 100.0);
        assert_eq!(results.points["C"], 100.0);
        assert!(results.ranking.iter().all(|entry| entry.rank == 1));

        assert!(manager.withdraw_vote(&room.code, "p2").await.unwrap());
        assert!(!manager.withdraw_vote(&room.code, "p2").await.unwrap());

        let results = manager.results(&room.code).await.unwrap();
        assert_eq!(results.participants, 2);
        assert_eq!(results.points.get("B"), None);
        assert_eq!(results.winner().map(|w| w.option.as_str()), Some("A"));
    }

    #[tokio::test]
    async fn test_options_update_keeps_votes() {
        let manager = memory_manager();
        let room = manager.create_room(Some(vec!["A".into(), "B".into()])).await.unwrap();
        manager
            .submit_vote(&room.code, "p1", &positions(&[("A", 25.0), ("B", 75.0)]))
            .await
            .unwrap();

        let options = manager
            .update_options(&room.code, vec!["C".into(), "D".into()])
            .await
            .unwrap();
        assert_eq!(options, vec!["C", "D"]);

        let results = manager.results(&room.code).await.unwrap();
        assert_eq!(results.points["A"], 50.0);
        assert_eq!(results.points["B"], 50.0);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_idle_rooms() {
        let manager = memory_manager();
        let stale = manager.create_room(None).await.unwrap();
        let now = Utc::now();

        assert_eq!(manager.sweep_idle_rooms_at(now).await.unwrap(), 0);
        let later = now + chrono::Duration::hours(25);
        assert_eq!(manager.sweep_idle_rooms_at(later).await.unwrap(), 1);
        assert!(!manager.room_exists(&stale.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_with_enormous_max_age_keeps_rooms() {
        let config = Config {
            room_max_age: chrono::Duration::weeks(1_000_000_000),
            ..Config::default()
        };
        let manager = RoomManager::new(Arc::new(MemoryStore::new()), config);
        let room = manager.create_room(None).await.unwrap();

        assert_eq!(manager.sweep_idle_rooms().await.unwrap(), 0);
        assert!(manager.room_exists(&room.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_preview_does_not_touch_store() {
        let manager = memory_manager();
        let placements = manager
            .preview(&positions(&[("A", 20.0), ("B", 50.0), ("C", 80.0)]))
            .unwrap();
        let shares: Vec<f64> = placements.iter().map(|p| p.share).collect();
        assert_eq!(shares, vec![35.0, 30.0, 35.0]);
        assert_eq!(manager.room_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_backed_round_trip() {
        let manager = sqlite_manager().await;
        let room = manager
            .create_room(Some(vec![
                "Pizza".into(),
                "Sushi".into(),
                "Burgers".into(),
                "Tacos".into(),
            ]))
            .await
            .unwrap();

        manager
            .submit_vote(
                &room.code,
                "alice",
                &positions(&[("Pizza", 20.0), ("Sushi", 40.0), ("Burgers", 80.0)]),
            )
            .await
            .unwrap();
        manager
            .submit_vote(&room.code, "bob", &positions(&[("Burgers", 30.0), ("Tacos", 70.0)]))
            .await
            .unwrap();

        let results = manager.results(&room.code.to_lowercase()).await.unwrap();
        let total: f64 = results.points.values().sum();
        assert_eq!(results.participants, 2);
        assert!((total - 200.0).abs() < 1e-9);
        assert_eq!(results.winner().map(|w| w.option.as_str()), Some("Burgers"));

        manager.delete_room(&room.code).await.unwrap();
        assert_eq!(manager.room_count().await.unwrap(), 0);
        manager.close().await;
    }
}
