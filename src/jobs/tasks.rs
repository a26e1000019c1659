/// Background task implementations
use crate::{context::AppContext, error::AppResult};
use chrono::{Duration, Utc};

/// Mark pending reports older than the configured age as failed
///
/// A pending row only outlives its generation task when the process stopped
/// mid-generation; failing it lets the next trigger regenerate.
pub async fn recover_stale_reports(ctx: &AppContext) -> AppResult<u64> {
    let cutoff = Utc::now() - Duration::minutes(ctx.config.jobs.stale_report_minutes);
    ctx.report_orchestrator.fail_stale(cutoff).await
}

/// Health check - verify the database is reachable
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedBackend;
    use crate::config::ServerConfig;

    #[tokio::test]
    async fn test_recover_stale_reports() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::for_directory(dir.path());
        let ctx = AppContext::with_chat_backend(config, ScriptedBackend::always("{}"))
            .await
            .unwrap();
        crate::db::testing::insert_active_pair(&ctx.db, "pair-x", "alice", "bob").await;

        let old = Utc::now() - Duration::hours(3);
        sqlx::query(
            "INSERT INTO reports (id, pair_id, report_type, status, report_date, created_at, updated_at)
             VALUES ('stuck', 'pair-x', 'weekly', 'pending', ?1, ?2, ?2)",
        )
        .bind(Utc::now().date_naive())
        .bind(old)
        .execute(&ctx.db)
        .await
        .unwrap();

        assert_eq!(recover_stale_reports(&ctx).await.unwrap(), 1);
        assert_eq!(recover_stale_reports(&ctx).await.unwrap(), 0);
        assert!(health_check(&ctx).await.is_ok());
    }
}
