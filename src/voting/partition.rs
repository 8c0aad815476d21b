//! Splits one participant's 100-point budget between the options they placed.
//!
//! Each option owns the stretch of the 0..=100 line that is closer to it than to any
//! other option, so its share is the distance between the midpoints to its sorted
//! neighbours (the outermost options extend to 0 and 100).

use std::cmp::Ordering;

use crate::error::VoteError;
use crate::models::{PositionMap, ShareMap};
use crate::voting::Placement;

pub const BUDGET: f64 = 100.0;
pub const MIN_POSITION: f64 = 0.0;
pub const MAX_POSITION: f64 = 100.0;

/// Checks every entry of a position map. The first offending entry fails the whole map.
pub fn validate_positions(positions: &PositionMap) -> Result<(), VoteError> {
    // Sorted so the reported entry does not depend on hash order.
    let mut entries: Vec<(&String, &f64)> = positions.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (label, &value) in entries {
        if label.trim().is_empty() {
            return Err(VoteError::EmptyLabel);
        }
        if !value.is_finite() {
            return Err(VoteError::NonFinitePosition {
                label: label.clone(),
            });
        }
        if !(MIN_POSITION..=MAX_POSITION).contains(&value) {
            return Err(VoteError::PositionOutOfRange {
                label: label.clone(),
                value,
            });
        }
    }
    Ok(())
}

/// Computes each option's share of the budget.
///
/// An empty map yields an empty result and a single option always receives the full
/// budget. Shares of a non-empty map sum to 100.
pub fn compute_shares(positions: &PositionMap) -> Result<ShareMap, VoteError> {
    Ok(placements(positions)?
        .into_iter()
        .map(|placement| (placement.option, placement.share))
        .collect())
}

/// Options in line order (position, then label) along with their share.
pub fn placements(positions: &PositionMap) -> Result<Vec<Placement>, VoteError> {
    validate_positions(positions)?;

    let sorted = sorted_by_position(positions);
    let last = sorted.len().saturating_sub(1);

    if sorted.len() == 1 {
        let (option, position) = sorted[0];
        return Ok(vec![Placement {
            option: option.clone(),
            position,
            share: BUDGET,
        }]);
    }

    let placements = sorted
        .iter()
        .enumerate()
        .map(|(i, &(option, position))| {
            let left_boundary = if i == 0 {
                MIN_POSITION
            } else {
                (sorted[i - 1].1 + position) / 2.0
            };
            let right_boundary = if i == last {
                MAX_POSITION
            } else {
                (position + sorted[i + 1].1) / 2.0
            };

            Placement {
                option: option.clone(),
                position,
                share: right_boundary - left_boundary,
            }
        })
        .collect();

    Ok(placements)
}

// Equal positions fall back to label order so the result never depends on hash order.
fn sorted_by_position(positions: &PositionMap) -> Vec<(&String, f64)> {
    let mut sorted: Vec<(&String, f64)> = positions
        .iter()
        .map(|(option, &position)| (option, position))
        .collect();
    sorted.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    sorted
}
