/// Database row types and the enums stored in their text columns
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::error::{AppError, AppResult};

/// Relationship kind of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PairType {
    Couple,
    Spouse,
    Bestfriend,
}

impl PairType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairType::Couple => "couple",
            PairType::Spouse => "spouse",
            PairType::Bestfriend => "bestfriend",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "couple" => Ok(PairType::Couple),
            "spouse" => Ok(PairType::Spouse),
            "bestfriend" => Ok(PairType::Bestfriend),
            _ => Err(AppError::Validation(format!("Invalid pair type: {}", s))),
        }
    }

    /// Wording used inside prompts
    pub fn describe(&self) -> &'static str {
        match self {
            PairType::Couple => "dating couple",
            PairType::Spouse => "married couple",
            PairType::Bestfriend => "pair of close friends",
        }
    }
}

/// Pair lifecycle: pending -> active -> ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PairStatus {
    Pending,
    Active,
    Ended,
}

impl PairStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairStatus::Pending => "pending",
            PairStatus::Active => "active",
            PairStatus::Ended => "ended",
        }
    }
}

/// Report period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReportType {
    Daily,
    Solo,
    Weekly,
    Monthly,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Daily => "daily",
            ReportType::Solo => "solo",
            ReportType::Weekly => "weekly",
            ReportType::Monthly => "monthly",
        }
    }

    /// Lenient parse, unknown names yield None
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Some(ReportType::Daily),
            "solo" => Some(ReportType::Solo),
            "weekly" => Some(ReportType::Weekly),
            "monthly" => Some(ReportType::Monthly),
            _ => None,
        }
    }

    /// JSON key holding the health score in generated content
    pub fn score_key(&self) -> &'static str {
        match self {
            ReportType::Daily | ReportType::Solo => "health_score",
            ReportType::Weekly | ReportType::Monthly => "overall_health_score",
        }
    }
}

/// Report processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
        }
    }
}

/// Registered user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub nickname: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Two-user bond owning check-ins, reports and a tree
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Pair {
    pub id: String,
    pub user_a_id: String,
    pub user_b_id: Option<String>,
    #[serde(rename = "type")]
    pub pair_type: PairType,
    pub status: PairStatus,
    pub invite_code: String,
    pub unbind_requested_by: Option<String>,
    pub unbind_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Pair {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.user_a_id == user_id || self.user_b_id.as_deref() == Some(user_id)
    }

    /// The other member, if the pair has been joined
    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        if self.user_a_id == user_id {
            self.user_b_id.as_deref()
        } else if self.user_b_id.as_deref() == Some(user_id) {
            Some(self.user_a_id.as_str())
        } else {
            None
        }
    }
}

/// One user's daily journal entry for a pair
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Checkin {
    pub id: String,
    pub pair_id: String,
    pub user_id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub voice_url: Option<String>,
    pub mood_tags: Option<Json<Vec<String>>>,
    pub sentiment_score: Option<f64>,
    pub image_analysis: Option<Json<serde_json::Value>>,
    pub mood_score: Option<i64>,
    pub interaction_freq: Option<i64>,
    pub interaction_initiative: Option<String>,
    pub deep_conversation: Option<bool>,
    pub task_completed: Option<bool>,
    pub checkin_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// AI-synthesized summary for a period
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub pair_id: String,
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub status: ReportStatus,
    pub content: Option<Json<serde_json::Value>>,
    pub health_score: Option<f64>,
    pub report_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Gamification accumulator, one per pair
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RelationshipTree {
    pub pair_id: String,
    pub growth_points: i64,
    pub level: String,
    pub milestones: Json<Vec<serde_json::Value>>,
    pub last_watered: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(b: Option<&str>) -> Pair {
        Pair {
            id: "p1".into(),
            user_a_id: "alice".into(),
            user_b_id: b.map(String::from),
            pair_type: PairType::Couple,
            status: PairStatus::Active,
            invite_code: "123456".into(),
            unbind_requested_by: None,
            unbind_requested_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_pair_membership() {
        let p = pair(Some("bob"));
        assert!(p.is_member("alice"));
        assert!(p.is_member("bob"));
        assert!(!p.is_member("carol"));
        assert_eq!(p.partner_of("alice"), Some("bob"));
        assert_eq!(p.partner_of("bob"), Some("alice"));
        assert_eq!(p.partner_of("carol"), None);
        assert_eq!(pair(None).partner_of("alice"), None);
    }

    #[test]
    fn test_pair_type_parsing() {
        assert_eq!(PairType::from_str("Spouse").unwrap(), PairType::Spouse);
        assert!(PairType::from_str("roommates").is_err());
    }

    #[test]
    fn test_report_type_score_key() {
        assert_eq!(ReportType::Daily.score_key(), "health_score");
        assert_eq!(ReportType::Monthly.score_key(), "overall_health_score");
        assert_eq!(ReportType::parse("WEEKLY"), Some(ReportType::Weekly));
        assert_eq!(ReportType::parse("all"), None);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: "u".into(),
            email: "a@b.c".into(),
            nickname: "A".into(),
            password_hash: "$argon2id$secret".into(),
            avatar_url: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
    }
}
