use thiserror::Error;

/// Rejections raised at the partition boundary. The whole call fails; nothing is clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VoteError {
    #[error("option label cannot be empty")]
    EmptyLabel,

    #[error("position for '{label}' is not a finite number")]
    NonFinitePosition { label: String },

    #[error("position {value} for '{label}' is outside 0..=100")]
    PositionOutOfRange { label: String, value: f64 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error("'{0}' is not a valid room code")]
    InvalidRoomCode(String),

    #[error("participant id cannot be empty")]
    EmptyParticipant,

    #[error("could not find a free room code after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i64, supported: i64 },

    #[error("failed to parse timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Vote(#[from] VoteError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
