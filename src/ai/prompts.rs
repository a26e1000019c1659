/// Prompt templates and fallbacks for the relationship reports
///
/// Templates use `{name}` placeholders filled by [`fill`]. Literal JSON braces
/// in the templates are left alone since only known keys are replaced.
use super::parse::display_value;
use serde_json::{json, Value};

pub const SYSTEM_PROMPT: &str = "You are the relationship health advisor of the Qinjian platform, with a background in evidence-based psychology.
Your analysis is grounded in these frameworks:
- John Gottman's research on intimate relationships, especially the Four Horsemen model (criticism, contempt, defensiveness, stonewalling)
- Bowlby's attachment theory (secure, anxious, avoidant, disorganized)
- The 5:1 positive-to-negative interaction ratio from positive psychology

Respond strictly in JSON with no other text.";

pub const SENTIMENT_PROMPT: &str = "You are a sentiment analysis engine. Analyze the emotional tone of the user's text and return JSON: {\"sentiment\": \"positive/negative/neutral\", \"score\": 0-10, \"emotions\": [\"emotion labels\"]}";

pub const DAILY_TEMPLATE: &str = r#"Below are today's check-ins from a {pair_type}. Analyze them using Gottman's theory and attachment theory.

[Partner A]
{content_a}

[Partner B]
{content_b}

Analyze along these dimensions and output JSON only:
{
    "mood_a": {"score": 1-10, "label": "mood description"},
    "mood_b": {"score": 1-10, "label": "mood description"},
    "communication_quality": {"score": 1-10, "note": "communication quality, with reference to the 5:1 ratio"},
    "health_score": 1-100,
    "insight": "one warm sentence summarizing the day",
    "suggestion": "one actionable suggestion",
    "highlights": ["highlight 1", "highlight 2"],
    "concerns": ["potential issues, if any"],
    "theory_tag": "main theory referenced",
    "risk_signals": ["relationship risk signals, if any, with reference to the Four Horsemen"]
}"#;

pub const SOLO_TEMPLATE: &str = r#"Below is today's personal check-in from someone in a {pair_type} relationship. Their partner has not checked in today.
Using attachment theory and positive psychology, write a personal emotional journal entry for them.

[Personal view]
{content}

Output JSON only:
{
    "mood": {"score": 1-10, "label": "mood description"},
    "health_score": 1-100,
    "self_insight": "an empathetic insight into their emotional state today",
    "emotional_pattern": "today's emotional pattern read through attachment theory",
    "self_care_tip": "one concrete self-care suggestion",
    "relationship_note": "a gentle note about the relationship, without blaming the partner for not checking in",
    "theory_tag": "main theory referenced"
}"#;

pub const WEEKLY_TEMPLATE: &str = r#"Below is a summary of the past 7 days of check-ins from a {pair_type}. Analyze the longitudinal trend using Gottman's theory.

{daily_summaries}

Write a weekly report as JSON:
{
    "overall_health_score": 1-100,
    "trend": "improving/stable/declining",
    "trend_description": "detailed description of this week's trend, with reference to the Four Horsemen",
    "mood_trend_a": {"average": 1-10, "trend": "up/stable/down"},
    "mood_trend_b": {"average": 1-10, "trend": "up/stable/down"},
    "communication_analysis": "communication pattern analysis with reference to the 5:1 ratio",
    "weekly_highlights": ["highlight 1", "highlight 2", "highlight 3"],
    "areas_to_improve": ["area 1", "area 2"],
    "action_plan": ["action 1", "action 2", "action 3"],
    "encouragement": "a warm word of encouragement",
    "theory_tag": "main theory referenced"
}"#;

pub const MONTHLY_TEMPLATE: &str = r#"Below are the weekly report summaries of the past 30 days for a {pair_type}. Produce an in-depth monthly analysis using attachment theory and the Gottman model.

{weekly_summaries}

Write a monthly report as JSON:
{
    "overall_health_score": 1-100,
    "monthly_trend": "improving/stable/declining",
    "executive_summary": "monthly relationship summary grounded in the frameworks",
    "emotional_patterns": {
        "a_pattern": "partner A's emotional pattern with reference to attachment style",
        "b_pattern": "partner B's emotional pattern with reference to attachment style",
        "interaction_pattern": "interaction pattern with reference to the Four Horsemen"
    },
    "strengths": ["strength 1", "strength 2"],
    "growth_areas": ["growth area 1", "growth area 2"],
    "monthly_milestones": ["milestone 1", "milestone 2"],
    "next_month_goals": ["goal 1", "goal 2"],
    "professional_note": "professional advice; if high-risk signals appear, gently suggest counseling"
}"#;

pub const IMAGE_SYSTEM_PROMPT: &str =
    "You are a relationship analyst. Identify the emotional cues and social signals in the image.";

/// Substitute `{key}` placeholders
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

/// Image analysis instruction, with optional context
pub fn image_prompt(context: &str) -> String {
    let mut prompt =
        String::from("Analyze what this image means emotionally in the context of a close relationship.");
    if !context.trim().is_empty() {
        prompt.push_str(" Background: ");
        prompt.push_str(context.trim());
    }
    prompt.push_str("\n\nOutput JSON: {\"mood\": \"mood\", \"social_signal\": \"social signal description\", \"score\": 1-10}");
    prompt
}

/// `Day i: health=.., insight=..` lines from daily report contents
pub fn daily_summaries(reports: &[Value]) -> String {
    reports
        .iter()
        .enumerate()
        .map(|(i, report)| {
            format!(
                "Day {}: health={}, insight={}",
                i + 1,
                display_value(report.get("health_score"), "--"),
                display_value(report.get("insight"), "none")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `Week i: health=.., trend=..` lines from weekly report contents
pub fn weekly_summaries(reports: &[Value]) -> String {
    reports
        .iter()
        .enumerate()
        .map(|(i, report)| {
            format!(
                "Week {}: health={}, trend={}",
                i + 1,
                display_value(report.get("overall_health_score"), "--"),
                display_value(report.get("trend"), "--")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn sentiment_fallback() -> Value {
    json!({"sentiment": "neutral", "score": 5, "emotions": []})
}

pub fn daily_fallback() -> Value {
    json!({
        "health_score": 50,
        "insight": "Today's analysis is still in progress, please check back later",
        "suggestion": "Try to spend some face-to-face time together"
    })
}

pub fn solo_fallback() -> Value {
    json!({
        "health_score": 50,
        "mood": {"score": 5, "label": "steady"},
        "self_insight": "Today's emotional analysis is still in progress, please check back later",
        "self_care_tip": "Give yourself a little quiet time"
    })
}

pub fn weekly_fallback() -> Value {
    json!({
        "overall_health_score": 50,
        "trend": "stable",
        "trend_description": "Analysis in progress",
        "encouragement": "Every day you record builds up energy for this relationship"
    })
}

pub fn monthly_fallback() -> Value {
    json!({
        "overall_health_score": 50,
        "monthly_trend": "stable",
        "executive_summary": "Monthly analysis in progress"
    })
}

pub fn image_fallback() -> Value {
    json!({"mood": "neutral", "social_signal": "unable to analyze", "score": 5})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_only_known_keys() {
        let out = fill(DAILY_TEMPLATE, &[("pair_type", "married couple"), ("content_a", "A"), ("content_b", "B")]);
        assert!(out.contains("from a married couple"));
        assert!(out.contains("[Partner A]\nA"));
        assert!(!out.contains("{content_b}"));
        // JSON skeleton braces survive
        assert!(out.contains("\"health_score\": 1-100"));
    }

    #[test]
    fn test_daily_summaries_format() {
        let reports = vec![
            json!({"health_score": 70, "insight": "talked a lot"}),
            json!({"health_score": 82.5}),
        ];
        assert_eq!(
            daily_summaries(&reports),
            "Day 1: health=70, insight=talked a lot\nDay 2: health=82.5, insight=none"
        );
    }

    #[test]
    fn test_weekly_summaries_format() {
        let reports = vec![json!({"overall_health_score": 64, "trend": "improving"}), json!({})];
        assert_eq!(
            weekly_summaries(&reports),
            "Week 1: health=64, trend=improving\nWeek 2: health=--, trend=--"
        );
    }

    #[test]
    fn test_image_prompt_context() {
        assert!(image_prompt("").ends_with("\"score\": 1-10}"));
        assert!(image_prompt("beach trip").contains("Background: beach trip"));
    }
}
