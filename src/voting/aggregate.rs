use log::warn;
use std::collections::HashMap;

use crate::models::{PointsMap, PositionMap};
use crate::voting::OptionPoints;
use crate::voting::partition::compute_shares;

/// Totals closer than this are treated as equal when ranking.
pub const TIE_TOLERANCE: f64 = 1e-9;

/// Outcome of summing a room's votes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub points: PointsMap,
    /// Participants that contributed a full 100-point budget.
    pub counted: usize,
    /// Participants whose positions were rejected, sorted.
    pub skipped: Vec<String>,
}

/// Sums every participant's shares per option.
///
/// A participant whose positions fail validation is left out and reported in
/// `skipped`; the rest of the room is still counted. Options nobody placed never
/// appear in the result. Participants are summed in id order, so the same room
/// always produces bit-identical totals.
pub fn tally(votes: &HashMap<String, PositionMap>) -> Tally {
    let mut result = Tally::default();

    let mut participants: Vec<(&String, &PositionMap)> = votes.iter().collect();
    participants.sort_by(|a, b| a.0.cmp(b.0));

    for (participant, positions) in participants {
        let shares = match compute_shares(positions) {
            Ok(shares) => shares,
            Err(e) => {
                warn!("Skipping vote from participant {}: {}", participant, e);
                result.skipped.push(participant.clone());
                continue;
            }
        };

        if shares.is_empty() {
            continue;
        }

        for (option, share) in shares {
            *result.points.entry(option).or_insert(0.0) += share;
        }
        result.counted += 1;
    }

    result.skipped.sort();
    result
}

/// Total points per option across all participants.
pub fn aggregate(votes: &HashMap<String, PositionMap>) -> PointsMap {
    tally(votes).points
}

/// Orders options by points, highest first. Totals within [`TIE_TOLERANCE`] of each
/// other are ordered by label and share a rank; options without points are left out.
pub fn rank(points: &PointsMap) -> Vec<OptionPoints> {
    let mut sorted: Vec<(&String, f64)> = points
        .iter()
        .filter(|(_, points)| **points > 0.0)
        .map(|(option, points)| (option, *points))
        .collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    // Each run of near-equal totals is anchored on its highest total, ordered by label,
    // and shares the rank of its first position.
    let mut ranking: Vec<OptionPoints> = Vec::with_capacity(sorted.len());
    let mut start = 0;
    while start < sorted.len() {
        let anchor = sorted[start].1;
        let end = sorted[start..]
            .iter()
            .position(|(_, points)| anchor - points >= TIE_TOLERANCE)
            .map_or(sorted.len(), |offset| start + offset);
        sorted[start..end].sort_by(|a, b| a.0.cmp(b.0));

        for (option, points) in &sorted[start..end] {
            ranking.push(OptionPoints {
                option: (*option).clone(),
                points: *points,
                rank: start + 1,
            });
        }
        start = end;
    }
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = TIE_TOLERANCE;

    fn vote(entries: &[(&str, f64)]) -> PositionMap {
        entries
            .iter()
            .map(|(label, position)| (label.to_string(), *position))
            .collect()
    }

    fn room(votes: Vec<(&str, PositionMap)>) -> HashMap<String, PositionMap> {
        votes
            .into_iter()
            .map(|(participant, positions)| (participant.to_string(), positions))
            .collect()
    }

    #[test]
    fn test_empty_room() {
        assert!(aggregate(&HashMap::new()).is_empty());
        assert_eq!(tally(&HashMap::new()), Tally::default());
    }

    #[test]
    fn test_single_participant_matches_their_shares() {
        let votes = room(vec![("p1", vote(&[("A", 0.0), ("B", 50.0), ("C", 100.0)]))]);
        let points = aggregate(&votes);
        assert_eq!(points["A"], 25.0);
        assert_eq!(points["B"], 50.0);
        assert_eq!(points["C"], 25.0);
    }

    #[test]
    fn test_total_is_one_budget_per_participant() {
        let votes = room(vec![
            ("p1", vote(&[("Option A", 10.0), ("Option B", 90.0)])),
            ("p2", vote(&[("Option A", 10.0), ("Option C", 50.0), ("Option D", 90.0)])),
            ("p3", vote(&[("Option B", 30.0), ("Option C", 70.0)])),
        ]);
        let result = tally(&votes);
        let total: f64 = result.points.values().sum();

        assert_eq!(result.counted, 3);
        assert!((total - 300.0).abs() < TOLERANCE);
        assert_eq!(result.points["Option A"], 80.0);
        assert_eq!(result.points["Option B"], 100.0);
        assert_eq!(result.points["Option C"], 90.0);
        assert_eq!(result.points["Option D"], 30.0);
    }

    #[test]
    fn test_single_option_votes_each_get_full_budget() {
        let votes = room(vec![
            ("p1", vote(&[("A", 50.0)])),
            ("p2", vote(&[("B", 0.0)])),
            ("p3", vote(&[("C", 100.0)])),
        ]);
        let points = aggregate(&votes);
        assert_eq!(points.len(), 3);
        assert_eq!(points["A"], 100.0);
        assert_eq!(points["B"], 100.0);
        assert_eq!(points["C"], 100.0);
        assert_eq!(points.get("D"), None);
    }

    #[test]
    fn test_invalid_vote_is_skipped_not_fatal() {
        let votes = room(vec![
            ("good", vote(&[("A", 20.0), ("B", 80.0)])),
            ("bad", vote(&[("A", f64::NAN)])),
            ("worse", vote(&[("B", 250.0)])),
        ]);
        let result = tally(&votes);

        assert_eq!(result.counted, 1);
        assert_eq!(result.skipped, vec!["bad".to_string(), "worse".to_string()]);
        assert_eq!(result.points["A"], 50.0);
        assert_eq!(result.points["B"], 50.0);
    }

    #[test]
    fn test_empty_vote_contributes_nothing() {
        let votes = room(vec![("p1", PositionMap::new()), ("p2", vote(&[("A", 5.0)]))]);
        let result = tally(&votes);
        assert_eq!(result.counted, 1);
        assert!(result.skipped.is_empty());
        assert_eq!(result.points.len(), 1);
    }

    #[test]
    fn test_rank_orders_by_points_then_label() {
        let points: PointsMap = [
            ("Sushi".to_string(), 80.0),
            ("Pizza".to_string(), 120.0),
            ("Burgers".to_string(), 80.0),
            ("Tacos".to_string(), 20.0),
            ("Salad".to_string(), 0.0),
        ]
        .into_iter()
        .collect();

        let ranking = rank(&points);
        let order: Vec<(&str, usize)> = ranking
            .iter()
            .map(|entry| (entry.option.as_str(), entry.rank))
            .collect();

        assert_eq!(
            order,
            vec![("Pizza", 1), ("Burgers", 2), ("Sushi", 2), ("Tacos", 4)]
        );
    }

    #[test]
    fn test_rank_shares_rank_for_rounding_noise() {
        let points: PointsMap = [
            ("Beta".to_string(), 0.1 + 0.2),
            ("Alpha".to_string(), 0.3),
            ("Gamma".to_string(), 0.2),
        ]
        .into_iter()
        .collect();

        let ranking = rank(&points);
        let order: Vec<(&str, usize)> = ranking
            .iter()
            .map(|entry| (entry.option.as_str(), entry.rank))
            .collect();

        assert_eq!(order, vec![("Alpha", 1), ("Beta", 1), ("Gamma", 3)]);
    }

    #[test]
    fn test_tally_is_independent_of_insertion_order() {
        let entries = vec![
            ("p1", vote(&[("A", 10.0), ("B", 33.3), ("C", 71.7)])),
            ("p2", vote(&[("A", 0.1), ("C", 0.2), ("B", 99.9)])),
            ("p3", vote(&[("B", 12.34), ("C", 56.78)])),
            ("p4", vote(&[("A", 1.0 / 3.0), ("B", 2.0 / 3.0), ("C", 42.0)])),
        ];
        let forward = tally(&room(entries.clone()));
        let backward = tally(&room(entries.into_iter().rev().collect()));

        for option in ["A", "B", "C"] {
            assert_eq!(
                forward.points[option].to_bits(),
                backward.points[option].to_bits()
            );
        }
        assert_eq!(rank(&forward.points), rank(&backward.points));
    }

    #[test]
    fn test_group_decision_scenario() {
        let votes = room(vec![
            ("alice", vote(&[("Pizza", 20.0), ("Sushi", 40.0), ("Burgers", 80.0)])),
            ("bob", vote(&[("Burgers", 30.0), ("Tacos", 70.0)])),
            (
                "charlie",
                vote(&[("Pizza", 10.0), ("Sushi", 40.0), ("Burgers", 60.0), ("Tacos", 90.0)]),
            ),
        ]);
        let ranking = rank(&aggregate(&votes));

        assert_eq!(ranking.len(), 4);
        assert_eq!(ranking[0].option, "Burgers");
        assert_eq!(ranking[0].rank, 1);
        let total: f64 = ranking.iter().map(|entry| entry.points).sum();
        assert!((total - 300.0).abs() < TOLERANCE);
    }
}
