use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::StoreError;

/// One participant's placement of the options they chose: label -> position in 0..=100.
pub type PositionMap = HashMap<String, f64>;

/// Label -> percentage of one participant's 100-point budget.
pub type ShareMap = HashMap<String, f64>;

/// Label -> summed shares across every participant of a room.
pub type PointsMap = HashMap<String, f64>;

pub const DEFAULT_OPTIONS: [&str; 4] = ["Option A", "Option B", "Option C", "Option D"];

/// Characters a room code may be generated from.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

lazy_static! {
    static ref ROOM_CODE_RE: Regex = Regex::new(r"^[A-Z0-9]{4,12}$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub code: String,
    pub options: Vec<String>,
    /// participant id -> that participant's positions
    pub votes: HashMap<String, PositionMap>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Room metadata without the vote payloads, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub code: String,
    pub options: Vec<String>,
    pub participants: usize,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Room {
    pub fn new(code: String, options: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            code,
            options,
            votes: HashMap::new(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn participant_count(&self) -> usize {
        self.votes.len()
    }

    /// True when the room was last touched strictly before `cutoff`.
    pub fn idle_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_updated < cutoff
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            code: self.code.clone(),
            options: self.options.clone(),
            participants: self.votes.len(),
            created_at: self.created_at,
            last_updated: self.last_updated,
        }
    }
}

/// Trims and uppercases a user supplied room code, then checks its shape.
pub fn normalize_room_code(raw: &str) -> Result<String, StoreError> {
    let code = raw.trim().to_uppercase();
    if ROOM_CODE_RE.is_match(&code) {
        Ok(code)
    } else {
        Err(StoreError::InvalidRoomCode(raw.to_string()))
    }
}

/// Trims labels, drops blanks and repeated labels (first occurrence wins).
pub fn normalize_options<I, S>(options: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    options
        .into_iter()
        .map(|option| option.as_ref().trim().to_string())
        .filter(|option| !option.is_empty() && seen.insert(option.clone()))
        .collect()
}

pub fn default_options() -> Vec<String> {
    DEFAULT_OPTIONS.iter().map(|option| option.to_string()).collect()
}
