/// Relationship tree endpoints
use crate::{
    api::PairQuery,
    auth::AuthUser,
    context::AppContext,
    error::AppResult,
    tree::{TreeStatus, WaterOutcome},
};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

/// Build tree routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/status", get(status))
        .route("/water", post(water))
}

async fn status(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<TreeStatus>> {
    ctx.pairing_manager
        .require_member(auth.id(), &query.pair_id)
        .await?;
    let status = ctx
        .tree_manager
        .status(&query.pair_id, Utc::now().date_naive())
        .await?;
    Ok(Json(status))
}

async fn water(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<WaterOutcome>> {
    ctx.pairing_manager
        .require_active_member(auth.id(), &query.pair_id)
        .await?;
    let outcome = ctx
        .tree_manager
        .water(&query.pair_id, Utc::now().date_naive())
        .await?;
    Ok(Json(outcome))
}
