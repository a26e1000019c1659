/// Report endpoints
///
/// Generation returns the report row immediately; a pending row is
/// completed in the background and can be polled through `latest`.
use crate::{
    api::PairQuery,
    auth::AuthUser,
    context::AppContext,
    db::models::{Report, ReportType},
    error::AppResult,
    reports::Trend,
};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

const HISTORY_DEFAULT_LIMIT: i64 = 7;
const TREND_DEFAULT_DAYS: i64 = 14;

/// Build report routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/generate-daily", post(generate_daily))
        .route("/generate-weekly", post(generate_weekly))
        .route("/generate-monthly", post(generate_monthly))
        .route("/latest", get(latest))
        .route("/history", get(history))
        .route("/trend", get(trend))
}

#[derive(Debug, Deserialize)]
struct ReportListQuery {
    pair_id: String,
    report_type: Option<String>,
    limit: Option<i64>,
}

impl ReportListQuery {
    /// Defaults to daily; an unrecognised type means every type
    fn report_type(&self) -> Option<ReportType> {
        match self.report_type.as_deref() {
            None => Some(ReportType::Daily),
            Some(value) => ReportType::parse(value),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrendQuery {
    pair_id: String,
    days: Option<i64>,
}

async fn generate_daily(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<Report>> {
    let pair = ctx
        .pairing_manager
        .require_active_member(auth.id(), &query.pair_id)
        .await?;
    let outcome = ctx
        .report_orchestrator
        .trigger_daily(&pair, Utc::now().date_naive())
        .await?;
    Ok(Json(outcome.report))
}

async fn generate_weekly(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<Report>> {
    let pair = ctx
        .pairing_manager
        .require_active_member(auth.id(), &query.pair_id)
        .await?;
    let outcome = ctx
        .report_orchestrator
        .trigger_weekly(&pair, Utc::now().date_naive())
        .await?;
    Ok(Json(outcome.report))
}

async fn generate_monthly(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<Report>> {
    let pair = ctx
        .pairing_manager
        .require_active_member(auth.id(), &query.pair_id)
        .await?;
    let outcome = ctx
        .report_orchestrator
        .trigger_monthly(&pair, Utc::now().date_naive())
        .await?;
    Ok(Json(outcome.report))
}

async fn latest(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<ReportListQuery>,
) -> AppResult<Json<Option<Report>>> {
    ctx.pairing_manager
        .require_member(auth.id(), &query.pair_id)
        .await?;
    let report = ctx
        .report_orchestrator
        .latest(&query.pair_id, query.report_type())
        .await?;
    Ok(Json(report))
}

async fn history(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<ReportListQuery>,
) -> AppResult<Json<Vec<Report>>> {
    ctx.pairing_manager
        .require_member(auth.id(), &query.pair_id)
        .await?;
    let reports = ctx
        .report_orchestrator
        .history(
            &query.pair_id,
            query.report_type(),
            query.limit.unwrap_or(HISTORY_DEFAULT_LIMIT),
        )
        .await?;
    Ok(Json(reports))
}

async fn trend(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<TrendQuery>,
) -> AppResult<Json<Trend>> {
    ctx.pairing_manager
        .require_member(auth.id(), &query.pair_id)
        .await?;
    let trend = ctx
        .report_orchestrator
        .trend(
            &query.pair_id,
            query.days.unwrap_or(TREND_DEFAULT_DAYS),
            Utc::now().date_naive(),
        )
        .await?;
    Ok(Json(trend))
}
