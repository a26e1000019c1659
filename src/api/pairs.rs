/// Pair lifecycle endpoints
use crate::{
    api::PairQuery,
    auth::AuthUser,
    context::AppContext,
    db::models::Pair,
    error::AppResult,
    pairing::{CreatePairRequest, JoinPairRequest, UnbindStatus, UNBIND_COOLING_OFF_DAYS},
};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

/// Build pair routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/create", post(create_pair))
        .route("/join", post(join_pair))
        .route("/me", get(my_pairs))
        .route("/request-unbind", post(request_unbind))
        .route("/confirm-unbind", post(confirm_unbind))
        .route("/cancel-unbind", post(cancel_unbind))
        .route("/unbind-status", get(unbind_status))
}

async fn create_pair(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<CreatePairRequest>,
) -> AppResult<Json<Pair>> {
    let pair = ctx.pairing_manager.create(auth.id(), &req.pair_type).await?;
    tracing::info!(pair_id = %pair.id, "pair created by {}", auth.id());
    Ok(Json(pair))
}

async fn join_pair(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<JoinPairRequest>,
) -> AppResult<Json<Pair>> {
    let pair = ctx.pairing_manager.join(auth.id(), &req.invite_code).await?;
    tracing::info!(pair_id = %pair.id, "pair joined by {}", auth.id());
    Ok(Json(pair))
}

async fn my_pairs(State(ctx): State<AppContext>, auth: AuthUser) -> AppResult<Json<Vec<Pair>>> {
    Ok(Json(ctx.pairing_manager.list_for_user(auth.id()).await?))
}

async fn request_unbind(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<Value>> {
    ctx.pairing_manager
        .request_unbind(auth.id(), &query.pair_id, Utc::now())
        .await?;
    Ok(Json(json!({
        "message": format!(
            "unbind requested, waiting for your partner to confirm (or confirm again after {} days)",
            UNBIND_COOLING_OFF_DAYS
        )
    })))
}

async fn confirm_unbind(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<Value>> {
    let resolution = ctx
        .pairing_manager
        .confirm_unbind(auth.id(), &query.pair_id, Utc::now())
        .await?;
    tracing::info!(pair_id = %query.pair_id, "pair ended: {:?}", resolution);
    Ok(Json(json!({ "message": resolution.message() })))
}

async fn cancel_unbind(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<Value>> {
    ctx.pairing_manager
        .cancel_unbind(auth.id(), &query.pair_id)
        .await?;
    Ok(Json(json!({ "message": "unbind request withdrawn" })))
}

async fn unbind_status(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<PairQuery>,
) -> AppResult<Json<UnbindStatus>> {
    let status = ctx
        .pairing_manager
        .unbind_status(auth.id(), &query.pair_id, Utc::now())
        .await?;
    Ok(Json(status))
}
