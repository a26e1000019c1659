/// Check-in endpoints
use crate::{
    api::PairQuery,
    auth::AuthUser,
    checkin::{CreateCheckinRequest, Streak, TodayStatus, HISTORY_DEFAULT_LIMIT},
    context::AppContext,
    db::models::Checkin,
    error::AppResult,
};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

/// Build check-in routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", post(create_checkin))
        .route("/create", post(create_checkin))
        .route("/today", get(today_status))
        .route("/history", get(history))
        .route("/streak", get(streak))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    pair_id: String,
    limit: Option<i64>,
}

/// Accept today's check-in; analysis and reports continue in the background
async fn create_checkin(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<CreateCheckinRequest>,
) -> AppResult<Json<Checkin>> {
    let today = Utc::now().date_naive();
    let outcome = ctx.checkin_manager.create(auth.id(), req, today).await?;

    if let Some(report) = &outcome.report {
        tracing::debug!(
            report_id = %report.report.id,
            "check-in {} linked to {} report",
            outcome.checkin.id,
            report.report.report_type.as_str()
        );
    }

    Ok(Json(outcome.checkin))
}

async fn today_status(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<TodayStatus>> {
    let status = ctx
        .checkin_manager
        .today_status(auth.id(), &query.pair_id, Utc::now().date_naive())
        .await?;
    Ok(Json(status))
}

async fn history(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<Checkin>>> {
    let checkins = ctx
        .checkin_manager
        .history(
            auth.id(),
            &query.pair_id,
            query.limit.unwrap_or(HISTORY_DEFAULT_LIMIT),
        )
        .await?;
    Ok(Json(checkins))
}

async fn streak(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<Streak>> {
    let streak = ctx
        .checkin_manager
        .streak(auth.id(), &query.pair_id, Utc::now().date_naive())
        .await?;
    Ok(Json(streak))
}
