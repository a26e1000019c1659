/// Report orchestration
///
/// Reports are generated at most once per pair, type and period. A trigger
/// writes a pending row and returns it immediately while a background task
/// asks the AI gateway for the content and completes or fails the row.

mod orchestrator;

pub use orchestrator::{GenerationInput, ReportOrchestrator, TriggerOutcome};

use crate::db::models::ReportType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Completed daily reports needed for a weekly report
pub const WEEKLY_MIN_DAILY: usize = 3;
/// Completed weekly reports needed for a monthly report
pub const MONTHLY_MIN_WEEKLY: usize = 2;
/// Mean difference that counts as a real trend
const TREND_THRESHOLD: f64 = 5.0;

/// Days covered by a report type, counted back from the report date
pub fn window_days(report_type: ReportType) -> i64 {
    match report_type {
        ReportType::Daily | ReportType::Solo => 0,
        ReportType::Weekly => 7,
        ReportType::Monthly => 30,
    }
}

/// Health score from generated content, clamped to 0-100
pub fn extract_health_score(report_type: ReportType, content: &Value) -> Option<f64> {
    let raw = content.get(report_type.score_key())?;
    let score = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    if score.is_finite() {
        Some(score.clamp(0.0, 100.0))
    } else {
        None
    }
}

/// Direction of the health score over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

/// Compare the mean of the last three scores against the first three
pub fn classify_trend(scores: &[f64]) -> TrendDirection {
    if scores.len() < 2 {
        return TrendDirection::InsufficientData;
    }

    let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len() as f64;
    let older = mean(&scores[..scores.len().min(3)]);
    let recent = mean(&scores[scores.len().saturating_sub(3)..]);

    if recent - older > TREND_THRESHOLD {
        TrendDirection::Improving
    } else if older - recent > TREND_THRESHOLD {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// One point of the health trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub score: f64,
}

/// Health trend response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub trend: Vec<TrendPoint>,
    pub direction: TrendDirection,
    pub days: i64,
}
