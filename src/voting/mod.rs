pub mod aggregate;
pub mod partition;

use serde::{Deserialize, Serialize};

use crate::models::PointsMap;

pub use aggregate::{Tally, aggregate, rank, tally};
pub use partition::{compute_shares, placements, validate_positions};

/// One option on a participant's line, with the share its territory is worth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub option: String,
    pub position: f64,
    pub share: f64,
}

// Structure to hold an option's standing in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionPoints {
    pub option: String,
    pub points: f64,
    pub rank: usize,
}

/// Everything the presentation layer needs to render a room's standings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomResults {
    pub ranking: Vec<OptionPoints>,
    pub points: PointsMap,
    /// Participants whose vote contributed a full budget.
    pub participants: usize,
    /// Participants whose stored vote was rejected and left out.
    pub skipped: Vec<String>,
}

impl RoomResults {
    pub fn from_tally(tally: Tally) -> Self {
        Self {
            ranking: rank(&tally.points),
            points: tally.points,
            participants: tally.counted,
            skipped: tally.skipped,
        }
    }

    pub fn winner(&self) -> Option<&OptionPoints> {
        self.ranking.first()
    }
}
