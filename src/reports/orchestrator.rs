/// Report orchestrator
use crate::{
    ai::AiGateway,
    db::{
        is_unique_violation,
        models::{Pair, PairType, Report, ReportStatus, ReportType},
    },
    error::{AppError, AppResult},
    metrics,
    reports::{
        classify_trend, extract_health_score, window_days, Trend, TrendPoint, MONTHLY_MIN_WEEKLY,
        WEEKLY_MIN_DAILY,
    },
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Stored on failed rows; upstream detail stays in the logs
const GENERATION_FAILED: &str = "report generation failed, please try again";

const REPORT_COLUMNS: &str = "id, pair_id, user_id, report_type, status, content, health_score, \
                              report_date, error, created_at, updated_at";

/// Inputs for one generation, gathered before the pending row is written
#[derive(Debug, Clone)]
pub enum GenerationInput {
    Daily { content_a: String, content_b: String },
    Solo { content: String },
    Weekly { daily: Vec<Value> },
    Monthly { weekly: Vec<Value> },
}

impl GenerationInput {
    pub fn report_type(&self) -> ReportType {
        match self {
            GenerationInput::Daily { .. } => ReportType::Daily,
            GenerationInput::Solo { .. } => ReportType::Solo,
            GenerationInput::Weekly { .. } => ReportType::Weekly,
            GenerationInput::Monthly { .. } => ReportType::Monthly,
        }
    }
}

/// Result of a trigger
///
/// `task` is set only when this call started a generation.
#[derive(Debug)]
pub struct TriggerOutcome {
    pub report: Report,
    pub task: Option<JoinHandle<()>>,
}

/// Report orchestrator
#[derive(Clone)]
pub struct ReportOrchestrator {
    db: SqlitePool,
    ai: AiGateway,
}

impl ReportOrchestrator {
    pub fn new(db: SqlitePool, ai: AiGateway) -> Self {
        Self { db, ai }
    }

    /// Joint daily report; both members must have checked in on `today`
    pub async fn trigger_daily(&self, pair: &Pair, today: NaiveDate) -> AppResult<TriggerOutcome> {
        if let Some(report) = self.reusable(&pair.id, ReportType::Daily, today).await? {
            return Ok(TriggerOutcome { report, task: None });
        }

        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT user_id, content FROM checkins WHERE pair_id = ?1 AND checkin_date = ?2",
        )
        .bind(&pair.id)
        .bind(today)
        .fetch_all(&self.db)
        .await?;

        let content_of = |user: Option<&str>| {
            rows.iter()
                .find(|(user_id, _)| Some(user_id.as_str()) == user)
                .map(|(_, content)| content.clone())
        };

        let (Some(content_a), Some(content_b)) = (
            content_of(Some(pair.user_a_id.as_str())),
            content_of(pair.user_b_id.as_deref()),
        ) else {
            return Err(AppError::Validation(
                "both members must check in before the daily report can be generated".to_string(),
            ));
        };

        self.start(pair, None, today, GenerationInput::Daily { content_a, content_b })
            .await
    }

    /// Personal report for a member whose partner has not checked in
    pub async fn trigger_solo(
        &self,
        pair: &Pair,
        user_id: &str,
        today: NaiveDate,
    ) -> AppResult<TriggerOutcome> {
        if let Some(report) = self.reusable(&pair.id, ReportType::Solo, today).await? {
            return Ok(TriggerOutcome { report, task: None });
        }

        let content: Option<String> = sqlx::query_scalar(
            "SELECT content FROM checkins WHERE pair_id = ?1 AND user_id = ?2 AND checkin_date = ?3",
        )
        .bind(&pair.id)
        .bind(user_id)
        .bind(today)
        .fetch_optional(&self.db)
        .await?;

        let content = content.ok_or_else(|| {
            AppError::Validation("check in today before generating a personal report".to_string())
        })?;

        self.start(pair, Some(user_id), today, GenerationInput::Solo { content })
            .await
    }

    /// Weekly report built from the past week's completed daily reports
    pub async fn trigger_weekly(&self, pair: &Pair, today: NaiveDate) -> AppResult<TriggerOutcome> {
        if let Some(report) = self.reusable(&pair.id, ReportType::Weekly, today).await? {
            return Ok(TriggerOutcome { report, task: None });
        }

        let daily = self
            .completed_contents(&pair.id, ReportType::Daily, today - Duration::days(7))
            .await?;
        if daily.len() < WEEKLY_MIN_DAILY {
            return Err(AppError::Validation(format!(
                "at least {} daily reports from the past 7 days are needed for a weekly report",
                WEEKLY_MIN_DAILY
            )));
        }

        self.start(pair, None, today, GenerationInput::Weekly { daily })
            .await
    }

    /// Monthly report built from the past month's completed weekly reports
    pub async fn trigger_monthly(&self, pair: &Pair, today: NaiveDate) -> AppResult<TriggerOutcome> {
        if let Some(report) = self.reusable(&pair.id, ReportType::Monthly, today).await? {
            return Ok(TriggerOutcome { report, task: None });
        }

        let weekly = self
            .completed_contents(&pair.id, ReportType::Weekly, today - Duration::days(30))
            .await?;
        if weekly.len() < MONTHLY_MIN_WEEKLY {
            return Err(AppError::Validation(format!(
                "at least {} weekly reports from the past 30 days are needed for a monthly report",
                MONTHLY_MIN_WEEKLY
            )));
        }

        self.start(pair, None, today, GenerationInput::Monthly { weekly })
            .await
    }

    /// Existing report in the window that should be returned as is
    ///
    /// A failed row is deleted so the caller regenerates it.
    async fn reusable(
        &self,
        pair_id: &str,
        report_type: ReportType,
        today: NaiveDate,
    ) -> AppResult<Option<Report>> {
        let since = today - Duration::days(window_days(report_type));
        let existing = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM reports
             WHERE pair_id = ?1 AND report_type = ?2 AND report_date >= ?3 AND report_date <= ?4
             ORDER BY report_date DESC",
            REPORT_COLUMNS
        ))
        .bind(pair_id)
        .bind(report_type.as_str())
        .bind(since)
        .bind(today)
        .fetch_all(&self.db)
        .await?;

        let mut reusable = None;
        for report in existing {
            match report.status {
                ReportStatus::Completed | ReportStatus::Pending => {
                    if reusable.is_none() {
                        reusable = Some(report);
                    }
                }
                ReportStatus::Failed => {
                    tracing::info!(
                        "Discarding failed {} report {} for pair {}",
                        report_type.as_str(),
                        report.id,
                        pair_id
                    );
                    sqlx::query("DELETE FROM reports WHERE id = ?1 AND status = ?2")
                        .bind(&report.id)
                        .bind(ReportStatus::Failed.as_str())
                        .execute(&self.db)
                        .await?;
                }
            }
        }

        Ok(reusable)
    }

    async fn completed_contents(
        &self,
        pair_id: &str,
        report_type: ReportType,
        since: NaiveDate,
    ) -> AppResult<Vec<Value>> {
        let rows: Vec<(Option<Json<Value>>,)> = sqlx::query_as(
            "SELECT content FROM reports
             WHERE pair_id = ?1 AND report_type = ?2 AND status = ?3 AND report_date >= ?4
             ORDER BY report_date ASC",
        )
        .bind(pair_id)
        .bind(report_type.as_str())
        .bind(ReportStatus::Completed.as_str())
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(content,)| content.map(|c| c.0))
            .collect())
    }

    /// Insert the pending placeholder and spawn generation
    async fn start(
        &self,
        pair: &Pair,
        user_id: Option<&str>,
        today: NaiveDate,
        input: GenerationInput,
    ) -> AppResult<TriggerOutcome> {
        let report_type = input.report_type();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let inserted = sqlx::query(
            "INSERT INTO reports (id, pair_id, user_id, report_type, status, content, health_score,
                                  report_date, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6, NULL, ?7, ?7)",
        )
        .bind(&id)
        .bind(&pair.id)
        .bind(user_id)
        .bind(report_type.as_str())
        .bind(ReportStatus::Pending.as_str())
        .bind(today)
        .bind(now)
        .execute(&self.db)
        .await;

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                // Lost the race to a concurrent trigger; its row wins
                tracing::debug!(
                    "Concurrent {} trigger for pair {}, returning existing row",
                    report_type.as_str(),
                    pair.id
                );
                let report = self
                    .find_for_date(&pair.id, report_type, today)
                    .await?
                    .ok_or_else(|| AppError::Internal("report vanished after conflict".to_string()))?;
                return Ok(TriggerOutcome { report, task: None });
            }
            return Err(e.into());
        }

        metrics::record_report(report_type.as_str(), ReportStatus::Pending.as_str());
        tracing::info!(
            "Started {} report {} for pair {}",
            report_type.as_str(),
            id,
            pair.id
        );

        let report = self
            .get(&id)
            .await?
            .ok_or_else(|| AppError::Internal("pending report not found".to_string()))?;

        let this = self.clone();
        let pair_type = pair.pair_type;
        let task = tokio::spawn(async move {
            this.generate(id, pair_type, input).await;
        });

        Ok(TriggerOutcome {
            report,
            task: Some(task),
        })
    }

    /// Background generation; always leaves the row completed or failed
    async fn generate(&self, report_id: String, pair_type: PairType, input: GenerationInput) {
        let report_type = input.report_type();
        let result = match &input {
            GenerationInput::Daily { content_a, content_b } => {
                self.ai.daily_report(pair_type, content_a, content_b).await
            }
            GenerationInput::Solo { content } => self.ai.solo_report(pair_type, content).await,
            GenerationInput::Weekly { daily } => self.ai.weekly_report(pair_type, daily).await,
            GenerationInput::Monthly { weekly } => self.ai.monthly_report(pair_type, weekly).await,
        };

        let outcome = match result {
            Ok(content) => self.complete(&report_id, report_type, content).await,
            Err(e) => {
                tracing::error!(
                    "{} report {} generation failed: {}",
                    report_type.as_str(),
                    report_id,
                    e
                );
                self.fail(&report_id, report_type, GENERATION_FAILED).await
            }
        };

        if let Err(e) = outcome {
            tracing::error!("Failed to record outcome of report {}: {}", report_id, e);
        }
    }

    async fn complete(&self, report_id: &str, report_type: ReportType, content: Value) -> AppResult<()> {
        let health_score = extract_health_score(report_type, &content);
        let mut conn = self.db.acquire().await?;

        sqlx::query(
            "UPDATE reports SET status = ?1, content = ?2, health_score = ?3, error = NULL, updated_at = ?4
             WHERE id = ?5 AND status = ?6",
        )
        .bind(ReportStatus::Completed.as_str())
        .bind(serde_json::to_string(&content)?)
        .bind(health_score)
        .bind(Utc::now())
        .bind(report_id)
        .bind(ReportStatus::Pending.as_str())
        .execute(&mut *conn)
        .await?;

        metrics::record_report(report_type.as_str(), ReportStatus::Completed.as_str());
        tracing::info!(
            "{} report {} completed (health score {:?})",
            report_type.as_str(),
            report_id,
            health_score
        );
        Ok(())
    }

    async fn fail(&self, report_id: &str, report_type: ReportType, error: &str) -> AppResult<()> {
        let mut conn = self.db.acquire().await?;

        sqlx::query(
            "UPDATE reports SET status = ?1, error = ?2, updated_at = ?3 WHERE id = ?4 AND status = ?5",
        )
        .bind(ReportStatus::Failed.as_str())
        .bind(error)
        .bind(Utc::now())
        .bind(report_id)
        .bind(ReportStatus::Pending.as_str())
        .execute(&mut *conn)
        .await?;

        metrics::record_report(report_type.as_str(), ReportStatus::Failed.as_str());
        Ok(())
    }

    /// Get report by id
    pub async fn get(&self, report_id: &str) -> AppResult<Option<Report>> {
        let report = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM reports WHERE id = ?1",
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(report)
    }

    async fn find_for_date(
        &self,
        pair_id: &str,
        report_type: ReportType,
        date: NaiveDate,
    ) -> AppResult<Option<Report>> {
        let report = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM reports WHERE pair_id = ?1 AND report_type = ?2 AND report_date = ?3",
            REPORT_COLUMNS
        ))
        .bind(pair_id)
        .bind(report_type.as_str())
        .bind(date)
        .fetch_optional(&self.db)
        .await?;

        Ok(report)
    }

    /// True when a row of this type exists for the date, any status
    pub async fn exists_for_date(
        &self,
        pair_id: &str,
        report_type: ReportType,
        date: NaiveDate,
    ) -> AppResult<bool> {
        Ok(self.find_for_date(pair_id, report_type, date).await?.is_some())
    }

    /// Most recent report, optionally of one type
    pub async fn latest(
        &self,
        pair_id: &str,
        report_type: Option<ReportType>,
    ) -> AppResult<Option<Report>> {
        Ok(self.history(pair_id, report_type, 1).await?.into_iter().next())
    }

    /// Reports newest first, optionally of one type
    pub async fn history(
        &self,
        pair_id: &str,
        report_type: Option<ReportType>,
        limit: i64,
    ) -> AppResult<Vec<Report>> {
        let limit = limit.clamp(1, 100);
        let reports = match report_type {
            Some(report_type) => {
                sqlx::query_as::<_, Report>(&format!(
                    "SELECT {} FROM reports WHERE pair_id = ?1 AND report_type = ?2
                     ORDER BY report_date DESC, created_at DESC LIMIT ?3",
                    REPORT_COLUMNS
                ))
                .bind(pair_id)
                .bind(report_type.as_str())
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Report>(&format!(
                    "SELECT {} FROM reports WHERE pair_id = ?1
                     ORDER BY report_date DESC, created_at DESC LIMIT ?2",
                    REPORT_COLUMNS
                ))
                .bind(pair_id)
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
        };

        Ok(reports)
    }

    /// Daily health scores over the last `days` days, oldest first
    pub async fn trend(&self, pair_id: &str, days: i64, today: NaiveDate) -> AppResult<Trend> {
        let days = days.clamp(1, 365);
        let rows: Vec<(NaiveDate, f64)> = sqlx::query_as(
            "SELECT report_date, health_score FROM reports
             WHERE pair_id = ?1 AND report_type = ?2 AND status = ?3
               AND report_date >= ?4 AND health_score IS NOT NULL
             ORDER BY report_date ASC",
        )
        .bind(pair_id)
        .bind(ReportType::Daily.as_str())
        .bind(ReportStatus::Completed.as_str())
        .bind(today - Duration::days(days))
        .fetch_all(&self.db)
        .await?;

        let points: Vec<TrendPoint> = rows
            .into_iter()
            .map(|(date, score)| TrendPoint { date, score })
            .collect();
        let scores: Vec<f64> = points.iter().map(|p| p.score).collect();

        Ok(Trend {
            direction: classify_trend(&scores),
            trend: points,
            days,
        })
    }

    /// Mark pending rows created before `cutoff` as failed
    pub async fn fail_stale(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE reports SET status = ?1, error = ?2, updated_at = ?3
             WHERE status = ?4 AND created_at < ?5",
        )
        .bind(ReportStatus::Failed.as_str())
        .bind("generation did not finish in time")
        .bind(Utc::now())
        .bind(ReportStatus::Pending.as_str())
        .bind(cutoff)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedBackend;
    use crate::db::testing;
    use crate::pairing::PairingManager;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        _dir: tempfile::TempDir,
        pool: SqlitePool,
        backend: Arc<ScriptedBackend>,
        reports: ReportOrchestrator,
        pair: Pair,
    }

    async fn fixture(backend: Arc<ScriptedBackend>) -> Fixture {
        let (dir, pool) = testing::pool().await;
        testing::insert_active_pair(&pool, "pair-1", "alice", "bob").await;
        let pair = PairingManager::new(pool.clone())
            .get("pair-1")
            .await
            .unwrap()
            .unwrap();
        let ai = AiGateway::new(backend.clone(), "text", "vision", dir.path().join("uploads"));
        Fixture {
            _dir: dir,
            reports: ReportOrchestrator::new(pool.clone(), ai),
            pool,
            backend,
            pair,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
    }

    async fn checkin(pool: &SqlitePool, user: &str, date: NaiveDate, content: &str) {
        sqlx::query(
            "INSERT INTO checkins (id, pair_id, user_id, content, checkin_date, created_at)
             VALUES (?1, 'pair-1', ?2, ?3, ?4, ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user)
        .bind(content)
        .bind(date)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    async fn completed(pool: &SqlitePool, report_type: ReportType, date: NaiveDate, content: Value) {
        sqlx::query(
            "INSERT INTO reports (id, pair_id, report_type, status, content, health_score, report_date, created_at, updated_at)
             VALUES (?1, 'pair-1', ?2, 'completed', ?3, NULL, ?4, ?5, ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(report_type.as_str())
        .bind(content.to_string())
        .bind(date)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    async fn finish(outcome: TriggerOutcome) -> Report {
        outcome.task.expect("generation task").await.unwrap();
        outcome.report
    }

    #[tokio::test]
    async fn test_daily_requires_both_checkins() {
        let f = fixture(ScriptedBackend::always("{\"health_score\": 80}")).await;
        checkin(&f.pool, "alice", today(), "good day").await;

        let err = f.reports.trigger_daily(&f.pair, today()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(f.backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_daily_two_phase_write() {
        let f = fixture(ScriptedBackend::always("```json\n{\"health_score\": 88, \"insight\": \"warm\"}\n```")).await;
        checkin(&f.pool, "alice", today(), "cooked together").await;
        checkin(&f.pool, "bob", today(), "nice dinner").await;

        let outcome = f.reports.trigger_daily(&f.pair, today()).await.unwrap();
        assert_eq!(outcome.report.status, ReportStatus::Pending);
        let pending = finish(outcome).await;

        let report = f.reports.get(&pending.id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Completed);
        assert_eq!(report.health_score, Some(88.0));
        assert_eq!(report.content.unwrap().0["insight"], "warm");

        let requests = f.backend.requests.lock().unwrap();
        let body = serde_json::to_string(&requests[0]).unwrap();
        assert!(body.contains("cooked together"));
        assert!(body.contains("nice dinner"));
    }

    #[tokio::test]
    async fn test_completed_report_is_not_regenerated() {
        let f = fixture(ScriptedBackend::always("{\"health_score\": 70}")).await;
        checkin(&f.pool, "alice", today(), "a").await;
        checkin(&f.pool, "bob", today(), "b").await;

        let first = finish(f.reports.trigger_daily(&f.pair, today()).await.unwrap()).await;
        let again = f.reports.trigger_daily(&f.pair, today()).await.unwrap();

        assert!(again.task.is_none());
        assert_eq!(again.report.id, first.id);
        assert_eq!(again.report.status, ReportStatus::Completed);
        assert_eq!(f.backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_report_is_replaced() {
        let backend = ScriptedBackend::new(vec![
            Err(AppError::Ai("upstream 503".to_string())),
            Ok("{\"health_score\": 64}".to_string()),
        ]);
        let f = fixture(backend).await;
        checkin(&f.pool, "alice", today(), "a").await;
        checkin(&f.pool, "bob", today(), "b").await;

        let first = finish(f.reports.trigger_daily(&f.pair, today()).await.unwrap()).await;
        let failed = f.reports.get(&first.id).await.unwrap().unwrap();
        assert_eq!(failed.status, ReportStatus::Failed);
        let error = failed.error.unwrap();
        assert_eq!(error, GENERATION_FAILED);
        assert!(!error.contains("upstream 503"));

        let retried = finish(f.reports.trigger_daily(&f.pair, today()).await.unwrap()).await;
        assert_ne!(retried.id, first.id);
        assert!(f.reports.get(&first.id).await.unwrap().is_none());

        let all = f.reports.history("pair-1", Some(ReportType::Daily), 7).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, ReportStatus::Completed);
        assert_eq!(all[0].health_score, Some(64.0));
    }

    #[tokio::test]
    async fn test_concurrent_triggers_yield_one_row() {
        let f = fixture(ScriptedBackend::always("{\"health_score\": 75}")).await;
        checkin(&f.pool, "alice", today(), "a").await;
        checkin(&f.pool, "bob", today(), "b").await;

        let (o1, o2) = tokio::join!(
            f.reports.trigger_daily(&f.pair, today()),
            f.reports.trigger_daily(&f.pair, today())
        );
        let (o1, o2) = (o1.unwrap(), o2.unwrap());
        assert_eq!(o1.report.id, o2.report.id);

        for outcome in [o1, o2] {
            if let Some(task) = outcome.task {
                task.await.unwrap();
            }
        }
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports")
            .fetch_one(&f.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(f.backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_solo_report_records_author() {
        let f = fixture(ScriptedBackend::always("garbage")).await;
        checkin(&f.pool, "bob", today(), "missing you").await;

        assert!(f.reports.trigger_solo(&f.pair, "alice", today()).await.is_err());

        let report = finish(f.reports.trigger_solo(&f.pair, "bob", today()).await.unwrap()).await;
        let stored = f.reports.get(&report.id).await.unwrap().unwrap();
        assert_eq!(stored.user_id.as_deref(), Some("bob"));
        assert_eq!(stored.report_type, ReportType::Solo);
        // Parse failure degrades to the fallback, still completed
        assert_eq!(stored.status, ReportStatus::Completed);
        assert_eq!(stored.health_score, Some(50.0));
        assert_eq!(stored.content.unwrap().0["raw_response"], "garbage");
    }

    #[tokio::test]
    async fn test_weekly_threshold_and_window() {
        let f = fixture(ScriptedBackend::always("{\"overall_health_score\": 77, \"trend\": \"improving\"}")).await;
        completed(&f.pool, ReportType::Daily, today() - Duration::days(10), json!({"health_score": 40})).await;
        completed(&f.pool, ReportType::Daily, today() - Duration::days(2), json!({"health_score": 60})).await;
        completed(&f.pool, ReportType::Daily, today() - Duration::days(1), json!({"health_score": 70})).await;

        // The 10-day-old report is outside the window
        let err = f.reports.trigger_weekly(&f.pair, today()).await.unwrap_err();
        assert!(err.to_string().contains("at least 3 daily reports"));

        completed(&f.pool, ReportType::Daily, today(), json!({"health_score": 80})).await;
        let weekly = finish(f.reports.trigger_weekly(&f.pair, today()).await.unwrap()).await;
        let stored = f.reports.get(&weekly.id).await.unwrap().unwrap();
        assert_eq!(stored.health_score, Some(77.0));

        // A weekly report from three days later still falls in the window
        let later = f
            .reports
            .trigger_weekly(&f.pair, today() + Duration::days(3))
            .await
            .unwrap();
        assert_eq!(later.report.id, weekly.id);
        assert!(later.task.is_none());
    }

    #[tokio::test]
    async fn test_monthly_needs_two_weeklies() {
        let f = fixture(ScriptedBackend::always("{\"overall_health_score\": 66}")).await;
        completed(&f.pool, ReportType::Weekly, today() - Duration::days(14), json!({"overall_health_score": 60, "trend": "stable"})).await;
        assert!(f.reports.trigger_monthly(&f.pair, today()).await.is_err());

        completed(&f.pool, ReportType::Weekly, today() - Duration::days(7), json!({"overall_health_score": 70, "trend": "improving"})).await;
        finish(f.reports.trigger_monthly(&f.pair, today()).await.unwrap()).await;

        let requests = f.backend.requests.lock().unwrap();
        let body = serde_json::to_string(&requests[0]).unwrap();
        assert!(body.contains("Week 1: health=60, trend=stable"));
        assert!(body.contains("Week 2: health=70, trend=improving"));
        assert_eq!(requests[0].model, "vision");
    }

    #[tokio::test]
    async fn test_history_latest_and_trend() {
        let f = fixture(ScriptedBackend::always("{}")).await;
        for (offset, score) in [(5, 50.0), (4, 52.0), (3, 55.0), (2, 65.0), (1, 70.0), (0, 72.0)] {
            let date = today() - Duration::days(offset);
            sqlx::query(
                "INSERT INTO reports (id, pair_id, report_type, status, content, health_score, report_date, created_at, updated_at)
                 VALUES (?1, 'pair-1', 'daily', 'completed', '{}', ?2, ?3, ?4, ?4)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(score)
            .bind(date)
            .bind(Utc::now())
            .execute(&f.pool)
            .await
            .unwrap();
        }
        completed(&f.pool, ReportType::Weekly, today(), json!({})).await;

        let latest = f.reports.latest("pair-1", Some(ReportType::Daily)).await.unwrap().unwrap();
        assert_eq!(latest.report_date, today());
        assert_eq!(latest.health_score, Some(72.0));

        assert_eq!(f.reports.history("pair-1", Some(ReportType::Daily), 3).await.unwrap().len(), 3);
        assert_eq!(f.reports.history("pair-1", None, 7).await.unwrap().len(), 7);

        let trend = f.reports.trend("pair-1", 14, today()).await.unwrap();
        assert_eq!(trend.trend.len(), 6);
        assert_eq!(trend.trend[0].score, 50.0);
        assert_eq!(trend.direction, crate::reports::TrendDirection::Improving);
    }

    #[tokio::test]
    async fn test_fail_stale_pending() {
        let f = fixture(ScriptedBackend::always("{}")).await;
        let old = Utc::now() - Duration::hours(2);
        sqlx::query(
            "INSERT INTO reports (id, pair_id, report_type, status, report_date, created_at, updated_at)
             VALUES ('stale', 'pair-1', 'daily', 'pending', ?1, ?2, ?2)",
        )
        .bind(today())
        .bind(old)
        .execute(&f.pool)
        .await
        .unwrap();

        let changed = f.reports.fail_stale(Utc::now() - Duration::minutes(30)).await.unwrap();
        assert_eq!(changed, 1);
        let report = f.reports.get("stale").await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Failed);
    }
}
