/// Daily check-ins
///
/// One check-in per user, pair and calendar day. Accepting a check-in
/// schedules sentiment (and image) analysis, grows the pair's tree and
/// triggers the daily or solo report.

mod manager;

pub use manager::{compute_streak, CheckinManager, CheckinOutcome, HISTORY_DEFAULT_LIMIT};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Check-in submission
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCheckinRequest {
    pub pair_id: String,
    #[validate(length(min = 1, max = 5000, message = "must be 1-5000 characters"))]
    pub content: String,
    pub mood_tags: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub voice_url: Option<String>,
    #[validate(range(min = 1, max = 4, message = "must be between 1 and 4"))]
    pub mood_score: Option<i64>,
    #[validate(range(min = 0, max = 99, message = "must be between 0 and 99"))]
    pub interaction_freq: Option<i64>,
    pub interaction_initiative: Option<String>,
    pub deep_conversation: Option<bool>,
    pub task_completed: Option<bool>,
}

/// Who started most interactions today
pub const INITIATIVE_VALUES: [&str; 3] = ["me", "partner", "equal"];

/// Today's check-in state for a pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodayStatus {
    pub date: NaiveDate,
    pub my_done: bool,
    pub partner_done: bool,
    pub both_done: bool,
    pub has_report: bool,
}

/// Consecutive-day streak
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub streak: i64,
    pub total_checkins: i64,
}
