//! Splits a 100-point budget between options placed on a 0-100 bar (each option owns
//! the part of the bar nearest to it) and combines many participants' splits into a
//! room ranking.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod manager;
pub mod models;
pub mod tasks;
pub mod voting;

pub use config::Config;
pub use error::{ConfigError, StoreError, VoteError};
pub use manager::RoomManager;
pub use models::{PointsMap, PositionMap, Room, ShareMap};
pub use voting::{RoomResults, aggregate, compute_shares, rank};
