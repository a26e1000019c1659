/// Relationship tree gamification
///
/// Each pair owns a tree that accrues growth points from check-ins and a
/// daily watering. Levels are a step function of the points.

mod manager;

pub use manager::{TreeManager, WATER_POINTS};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Growth stage of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeLevel {
    Seed,
    Sprout,
    Sapling,
    Tree,
    BigTree,
    Forest,
}

/// Minimum growth points for each level, ascending
pub const LEVEL_THRESHOLDS: [(i64, TreeLevel); 6] = [
    (0, TreeLevel::Seed),
    (50, TreeLevel::Sprout),
    (150, TreeLevel::Sapling),
    (350, TreeLevel::Tree),
    (700, TreeLevel::BigTree),
    (1200, TreeLevel::Forest),
];

impl TreeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeLevel::Seed => "seed",
            TreeLevel::Sprout => "sprout",
            TreeLevel::Sapling => "sapling",
            TreeLevel::Tree => "tree",
            TreeLevel::BigTree => "big_tree",
            TreeLevel::Forest => "forest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        LEVEL_THRESHOLDS
            .iter()
            .map(|(_, level)| *level)
            .find(|level| level.as_str() == s)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TreeLevel::Seed => "Seed",
            TreeLevel::Sprout => "Sprout",
            TreeLevel::Sapling => "Sapling",
            TreeLevel::Tree => "Young tree",
            TreeLevel::BigTree => "Big tree",
            TreeLevel::Forest => "Forest",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            TreeLevel::Seed => "🌰",
            TreeLevel::Sprout => "🌱",
            TreeLevel::Sapling => "🌿",
            TreeLevel::Tree => "🌳",
            TreeLevel::BigTree => "🏔️",
            TreeLevel::Forest => "🌲",
        }
    }

    /// Level reached with `points` growth points
    pub fn for_points(points: i64) -> Self {
        LEVEL_THRESHOLDS
            .iter()
            .rev()
            .find(|(threshold, _)| points >= *threshold)
            .map(|(_, level)| *level)
            .unwrap_or(TreeLevel::Seed)
    }
}

/// Points needed for the next level, None at the top
pub fn next_threshold(points: i64) -> Option<i64> {
    LEVEL_THRESHOLDS
        .iter()
        .map(|(threshold, _)| *threshold)
        .find(|threshold| *threshold > points)
}

/// Share of the next threshold reached, 100 at the top level
pub fn progress_percent(points: i64) -> i64 {
    match next_threshold(points) {
        Some(next) => (points.max(0) * 100 / next).min(100),
        None => 100,
    }
}

/// Tree status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeStatus {
    pub growth_points: i64,
    pub level: TreeLevel,
    pub level_name: String,
    pub level_emoji: String,
    pub next_level_at: Option<i64>,
    pub progress_percent: i64,
    pub milestones: Vec<Value>,
    pub last_watered: Option<chrono::NaiveDate>,
    pub can_water: bool,
}

/// Watering response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterOutcome {
    pub growth_points: i64,
    pub level: TreeLevel,
    pub level_name: String,
    pub level_emoji: String,
    pub points_added: i64,
    pub level_up: bool,
}

/// Growth points for one check-in
pub fn checkin_points(partner_done: bool, streak: i64) -> i64 {
    let mut points = 10;
    if partner_done {
        points += 15;
    }
    if streak >= 7 {
        points += 10;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(TreeLevel::for_points(0), TreeLevel::Seed);
        assert_eq!(TreeLevel::for_points(49), TreeLevel::Seed);
        assert_eq!(TreeLevel::for_points(50), TreeLevel::Sprout);
        assert_eq!(TreeLevel::for_points(349), TreeLevel::Sapling);
        assert_eq!(TreeLevel::for_points(350), TreeLevel::Tree);
        assert_eq!(TreeLevel::for_points(700), TreeLevel::BigTree);
        assert_eq!(TreeLevel::for_points(5000), TreeLevel::Forest);
    }

    #[test]
    fn test_levels_are_monotonic() {
        let mut previous = TreeLevel::Seed;
        for points in 0..1500 {
            let level = TreeLevel::for_points(points);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_progress() {
        assert_eq!(next_threshold(0), Some(50));
        assert_eq!(progress_percent(25), 50);
        assert_eq!(next_threshold(160), Some(350));
        assert_eq!(next_threshold(1200), None);
        assert_eq!(progress_percent(1300), 100);
    }

    #[test]
    fn test_checkin_points() {
        assert_eq!(checkin_points(false, 1), 10);
        assert_eq!(checkin_points(true, 1), 25);
        assert_eq!(checkin_points(true, 7), 35);
        assert_eq!(checkin_points(false, 9), 20);
    }

    #[test]
    fn test_level_names_roundtrip() {
        for (_, level) in LEVEL_THRESHOLDS {
            assert_eq!(TreeLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(TreeLevel::parse("bonsai"), None);
    }
}
