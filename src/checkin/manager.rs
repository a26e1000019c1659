/// Check-in manager
use crate::{
    ai::AiGateway,
    checkin::{CreateCheckinRequest, Streak, TodayStatus, INITIATIVE_VALUES},
    db::{
        is_unique_violation,
        models::{Checkin, Pair, ReportType},
    },
    error::{AppError, AppResult},
    metrics,
    pairing::PairingManager,
    reports::{ReportOrchestrator, TriggerOutcome},
    tree::TreeManager,
};
use chrono::{Duration, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use uuid::Uuid;
use validator::Validate;

/// Default number of entries returned by history
pub const HISTORY_DEFAULT_LIMIT: i64 = 14;

const CHECKIN_COLUMNS: &str = "id, pair_id, user_id, content, image_url, voice_url, mood_tags, \
                               sentiment_score, image_analysis, mood_score, interaction_freq, \
                               interaction_initiative, deep_conversation, task_completed, \
                               checkin_date, created_at";

/// Consecutive days ending `today`, given distinct dates newest first
pub fn compute_streak(dates_desc: &[NaiveDate], today: NaiveDate) -> i64 {
    let mut streak = 0;
    let mut expected = today;
    for date in dates_desc {
        if *date == expected {
            streak += 1;
            expected -= Duration::days(1);
        } else if *date < expected {
            break;
        }
    }
    streak
}

/// Report started by a new check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportTrigger {
    Daily,
    Solo,
    /// Partner state unknown
    Skip,
}

impl ReportTrigger {
    fn for_partner(partner_done: Option<bool>) -> Self {
        match partner_done {
            Some(true) => ReportTrigger::Daily,
            Some(false) => ReportTrigger::Solo,
            None => ReportTrigger::Skip,
        }
    }
}

/// Accepted check-in plus handles to its follow-up work
#[derive(Debug)]
pub struct CheckinOutcome {
    pub checkin: Checkin,
    /// Sentiment and image analysis writing back to the row
    pub analysis: JoinHandle<()>,
    /// Daily or solo report trigger, None if it could not start
    pub report: Option<TriggerOutcome>,
}

/// Check-in manager
#[derive(Clone)]
pub struct CheckinManager {
    db: SqlitePool,
    pairs: PairingManager,
    trees: TreeManager,
    reports: ReportOrchestrator,
    ai: AiGateway,
}

impl CheckinManager {
    pub fn new(
        db: SqlitePool,
        pairs: PairingManager,
        trees: TreeManager,
        reports: ReportOrchestrator,
        ai: AiGateway,
    ) -> Self {
        Self {
            db,
            pairs,
            trees,
            reports,
            ai,
        }
    }

    /// Submit today's check-in
    pub async fn create(
        &self,
        user_id: &str,
        request: CreateCheckinRequest,
        today: NaiveDate,
    ) -> AppResult<CheckinOutcome> {
        let pair = self
            .pairs
            .require_active_member(user_id, &request.pair_id)
            .await?;

        request.validate()?;
        if let Some(initiative) = request.interaction_initiative.as_deref() {
            if !INITIATIVE_VALUES.contains(&initiative) {
                return Err(AppError::Validation(
                    "interaction_initiative must be one of me, partner, equal".to_string(),
                ));
            }
        }

        if self.find(&pair.id, user_id, today).await?.is_some() {
            return Err(AppError::Validation("already checked in today".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO checkins (id, pair_id, user_id, content, image_url, voice_url, mood_tags,
                                   mood_score, interaction_freq, interaction_initiative,
                                   deep_conversation, task_completed, checkin_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .bind(&id)
        .bind(&pair.id)
        .bind(user_id)
        .bind(&request.content)
        .bind(&request.image_url)
        .bind(&request.voice_url)
        .bind(request.mood_tags.clone().map(Json))
        .bind(request.mood_score)
        .bind(request.interaction_freq)
        .bind(&request.interaction_initiative)
        .bind(request.deep_conversation)
        .bind(request.task_completed)
        .bind(today)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(|e| {
            // The unique index catches a concurrent duplicate
            if is_unique_violation(&e) {
                AppError::Validation("already checked in today".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        metrics::record_checkin();
        tracing::info!("Check-in {} for pair {} by {}", id, pair.id, user_id);

        let checkin = self
            .get(&id)
            .await?
            .ok_or_else(|| AppError::Internal("check-in not found after insert".to_string()))?;

        let analysis = self.spawn_analysis(&checkin);
        let report = self.follow_up(&pair, user_id, today).await;

        Ok(CheckinOutcome {
            checkin,
            analysis,
            report,
        })
    }

    /// Tree growth and report trigger; failures are logged, not returned
    async fn follow_up(&self, pair: &Pair, user_id: &str, today: NaiveDate) -> Option<TriggerOutcome> {
        // None when the partner's state could not be read
        let partner_done = match pair.partner_of(user_id) {
            Some(partner) => match self.find(&pair.id, partner, today).await {
                Ok(found) => Some(found.is_some()),
                Err(e) => {
                    tracing::error!("Partner lookup for pair {} failed: {}", pair.id, e);
                    None
                }
            },
            None => Some(false),
        };

        match self.streak_for(&pair.id, user_id, today).await {
            Ok(streak) => {
                if let Err(e) = self
                    .trees
                    .grow_on_checkin(&pair.id, partner_done.unwrap_or(false), streak.streak, today)
                    .await
                {
                    tracing::error!("Tree growth for pair {} failed: {}", pair.id, e);
                }
            }
            Err(e) => tracing::error!("Streak lookup for pair {} failed: {}", pair.id, e),
        }

        let triggered = match ReportTrigger::for_partner(partner_done) {
            ReportTrigger::Daily => self.reports.trigger_daily(pair, today).await,
            ReportTrigger::Solo => self.reports.trigger_solo(pair, user_id, today).await,
            ReportTrigger::Skip => {
                tracing::warn!("Skipping report trigger on pair {}: partner state unknown", pair.id);
                return None;
            }
        };

        match triggered {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!("Report trigger after check-in on pair {} failed: {}", pair.id, e);
                None
            }
        }
    }

    /// Background sentiment and image analysis for a new check-in
    fn spawn_analysis(&self, checkin: &Checkin) -> JoinHandle<()> {
        let db = self.db.clone();
        let ai = self.ai.clone();
        let checkin_id = checkin.id.clone();
        let content = checkin.content.clone();
        let image_url = checkin.image_url.clone();

        tokio::spawn(async move {
            match ai.analyze_sentiment(&content).await {
                Ok(sentiment) => {
                    let updated = sqlx::query("UPDATE checkins SET sentiment_score = ?1 WHERE id = ?2")
                        .bind(sentiment.score)
                        .bind(&checkin_id)
                        .execute(&db)
                        .await;
                    if let Err(e) = updated {
                        tracing::error!("Saving sentiment for check-in {} failed: {}", checkin_id, e);
                    }
                }
                Err(e) => tracing::warn!("Sentiment analysis for check-in {} failed: {}", checkin_id, e),
            }

            if let Some(url) = image_url {
                let analysis = ai.analyze_image(&url, &content).await;
                let updated = sqlx::query("UPDATE checkins SET image_analysis = ?1 WHERE id = ?2")
                    .bind(Json(analysis))
                    .bind(&checkin_id)
                    .execute(&db)
                    .await;
                if let Err(e) = updated {
                    tracing::error!("Saving image analysis for check-in {} failed: {}", checkin_id, e);
                }
            }
        })
    }

    /// Get check-in by id
    pub async fn get(&self, checkin_id: &str) -> AppResult<Option<Checkin>> {
        let checkin = sqlx::query_as::<_, Checkin>(&format!(
            "SELECT {} FROM checkins WHERE id = ?1",
            CHECKIN_COLUMNS
        ))
        .bind(checkin_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(checkin)
    }

    async fn find(&self, pair_id: &str, user_id: &str, date: NaiveDate) -> AppResult<Option<Checkin>> {
        let checkin = sqlx::query_as::<_, Checkin>(&format!(
            "SELECT {} FROM checkins WHERE pair_id = ?1 AND user_id = ?2 AND checkin_date = ?3",
            CHECKIN_COLUMNS
        ))
        .bind(pair_id)
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.db)
        .await?;

        Ok(checkin)
    }

    /// Today's completion state for the caller and their partner
    pub async fn today_status(
        &self,
        user_id: &str,
        pair_id: &str,
        today: NaiveDate,
    ) -> AppResult<TodayStatus> {
        self.pairs.require_member(user_id, pair_id).await?;

        let authors: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM checkins WHERE pair_id = ?1 AND checkin_date = ?2",
        )
        .bind(pair_id)
        .bind(today)
        .fetch_all(&self.db)
        .await?;

        let my_done = authors.iter().any(|a| a == user_id);
        let partner_done = authors.iter().any(|a| a != user_id);
        let has_report = self
            .reports
            .exists_for_date(pair_id, ReportType::Daily, today)
            .await?;

        Ok(TodayStatus {
            date: today,
            my_done,
            partner_done,
            both_done: my_done && partner_done,
            has_report,
        })
    }

    /// The caller's own check-ins, newest first
    pub async fn history(&self, user_id: &str, pair_id: &str, limit: i64) -> AppResult<Vec<Checkin>> {
        self.pairs.require_member(user_id, pair_id).await?;

        let checkins = sqlx::query_as::<_, Checkin>(&format!(
            "SELECT {} FROM checkins WHERE pair_id = ?1 AND user_id = ?2
             ORDER BY checkin_date DESC LIMIT ?3",
            CHECKIN_COLUMNS
        ))
        .bind(pair_id)
        .bind(user_id)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.db)
        .await?;

        Ok(checkins)
    }

    /// Consecutive-day streak ending today
    pub async fn streak(&self, user_id: &str, pair_id: &str, today: NaiveDate) -> AppResult<Streak> {
        self.pairs.require_member(user_id, pair_id).await?;
        self.streak_for(pair_id, user_id, today).await
    }

    async fn streak_for(&self, pair_id: &str, user_id: &str, today: NaiveDate) -> AppResult<Streak> {
        let dates: Vec<NaiveDate> = sqlx::query_scalar(
            "SELECT DISTINCT checkin_date FROM checkins WHERE pair_id = ?1 AND user_id = ?2
             ORDER BY checkin_date DESC",
        )
        .bind(pair_id)
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(Streak {
            streak: compute_streak(&dates, today),
            total_checkins: dates.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedBackend;
    use crate::db::models::ReportStatus;
    use crate::db::testing;
    use std::sync::Arc;

    struct Fixture {
        _dir: tempfile::TempDir,
        pool: SqlitePool,
        backend: Arc<ScriptedBackend>,
        checkins: CheckinManager,
        trees: TreeManager,
    }

    async fn fixture() -> Fixture {
        let (dir, pool) = testing::pool().await;
        testing::insert_active_pair(&pool, "pair-1", "alice", "bob").await;
        testing::insert_user(&pool, "carol").await;

        let backend = ScriptedBackend::always(
            "{\"sentiment\": \"positive\", \"score\": 8, \"emotions\": [], \"health_score\": 81}",
        );
        let ai = AiGateway::new(backend.clone(), "text", "vision", dir.path().join("uploads"));
        let pairs = PairingManager::new(pool.clone());
        let trees = TreeManager::new(pool.clone());
        let reports = ReportOrchestrator::new(pool.clone(), ai.clone());
        Fixture {
            checkins: CheckinManager::new(pool.clone(), pairs, trees.clone(), reports, ai),
            _dir: dir,
            pool,
            backend,
            trees,
        }
    }

    fn request(content: &str) -> CreateCheckinRequest {
        CreateCheckinRequest {
            pair_id: "pair-1".to_string(),
            content: content.to_string(),
            mood_tags: Some(vec!["calm".to_string()]),
            image_url: None,
            voice_url: None,
            mood_score: Some(3),
            interaction_freq: Some(4),
            interaction_initiative: Some("equal".to_string()),
            deep_conversation: Some(true),
            task_completed: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    async fn settle(outcome: CheckinOutcome) -> CheckinOutcome {
        let CheckinOutcome {
            checkin,
            analysis,
            report,
        } = outcome;
        analysis.await.unwrap();
        let report = match report {
            Some(TriggerOutcome { report, task }) => {
                if let Some(task) = task {
                    task.await.unwrap();
                }
                Some(TriggerOutcome { report, task: None })
            }
            None => None,
        };
        CheckinOutcome {
            checkin,
            analysis: tokio::spawn(async {}),
            report,
        }
    }

    #[test]
    fn test_compute_streak() {
        let t = today();
        let d = |n: i64| t - Duration::days(n);
        assert_eq!(compute_streak(&[], t), 0);
        assert_eq!(compute_streak(&[d(0), d(1), d(2), d(4)], t), 3);
        // Missing today breaks the streak
        assert_eq!(compute_streak(&[d(1), d(2)], t), 0);
        // Future-dated rows are skipped
        assert_eq!(compute_streak(&[t + Duration::days(1), d(0)], t), 1);
    }

    #[test]
    fn test_report_trigger_for_partner_state() {
        assert_eq!(ReportTrigger::for_partner(Some(true)), ReportTrigger::Daily);
        assert_eq!(ReportTrigger::for_partner(Some(false)), ReportTrigger::Solo);
        // A failed lookup must not fall through to a solo report
        assert_eq!(ReportTrigger::for_partner(None), ReportTrigger::Skip);
    }

    #[tokio::test]
    async fn test_solo_then_daily_flow() {
        let f = fixture().await;

        let first = settle(f.checkins.create("alice", request("busy day"), today()).await.unwrap()).await;
        let solo = first.report.unwrap().report;
        assert_eq!(solo.report_type, ReportType::Solo);

        let stored = f.checkins.get(&first.checkin.id).await.unwrap().unwrap();
        assert_eq!(stored.sentiment_score, Some(8.0));
        assert_eq!(stored.mood_tags.unwrap().0, vec!["calm".to_string()]);

        let second = settle(f.checkins.create("bob", request("missed her"), today()).await.unwrap()).await;
        let daily = second.report.unwrap().report;
        assert_eq!(daily.report_type, ReportType::Daily);
        let status: String = sqlx::query_scalar("SELECT status FROM reports WHERE id = ?1")
            .bind(&daily.id)
            .fetch_one(&f.pool)
            .await
            .unwrap();
        assert_eq!(status, ReportStatus::Completed.as_str());

        // 10 for alice, 10 + 15 for bob
        let tree = f.trees.status("pair-1", today()).await.unwrap();
        assert_eq!(tree.growth_points, 35);

        let status = f.checkins.today_status("alice", "pair-1", today()).await.unwrap();
        assert!(status.both_done);
        assert!(status.has_report);
    }

    #[tokio::test]
    async fn test_second_checkin_same_day_rejected() {
        let f = fixture().await;
        settle(f.checkins.create("alice", request("one"), today()).await.unwrap()).await;

        let err = f.checkins.create("alice", request("two"), today()).await.unwrap_err();
        assert_eq!(err.to_string(), "already checked in today");

        // Next day is fine
        assert!(f
            .checkins
            .create("alice", request("three"), today() + Duration::days(1))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_checkins() {
        let f = fixture().await;
        let (a, b) = tokio::join!(
            f.checkins.create("alice", request("x"), today()),
            f.checkins.create("alice", request("y"), today())
        );
        assert!(a.is_ok() != b.is_ok());

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM checkins WHERE user_id = 'alice' AND checkin_date = ?1",
        )
        .bind(today())
        .fetch_one(&f.pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_non_member_rejected() {
        let f = fixture().await;
        let err = f.checkins.create("carol", request("hi"), today()).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
        assert!(f.checkins.history("carol", "pair-1", 14).await.is_err());
    }

    #[tokio::test]
    async fn test_structured_fields_validated() {
        let f = fixture().await;
        let mut bad = request("x");
        bad.mood_score = Some(5);
        assert!(matches!(
            f.checkins.create("alice", bad, today()).await,
            Err(AppError::Validation(_))
        ));

        let mut bad = request("x");
        bad.interaction_initiative = Some("nobody".to_string());
        assert!(matches!(
            f.checkins.create("alice", bad, today()).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(f.backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_history_is_private_and_streak_counts() {
        let f = fixture().await;
        for n in (0..3).rev() {
            settle(
                f.checkins
                    .create("alice", request(&format!("day {}", n)), today() - Duration::days(n))
                    .await
                    .unwrap(),
            )
            .await;
        }
        settle(f.checkins.create("bob", request("bob's day"), today()).await.unwrap()).await;

        let history = f.checkins.history("alice", "pair-1", 14).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|c| c.user_id == "alice"));
        assert_eq!(history[0].checkin_date, today());

        let streak = f.checkins.streak("alice", "pair-1", today()).await.unwrap();
        assert_eq!(streak, Streak { streak: 3, total_checkins: 3 });
    }
}
