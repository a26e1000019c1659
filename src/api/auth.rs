/// Registration and login endpoints
use crate::{
    account::{LoginRequest, RegisterRequest, TokenResponse},
    context::AppContext,
    error::AppResult,
};
use axum::{extract::State, routing::post, Json, Router};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<TokenResponse>> {
    tracing::info!("register: new account for {}", req.email);
    let token = ctx.account_manager.register(req).await?;
    Ok(Json(token))
}

async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = ctx.account_manager.login(&req.email, &req.password).await?;
    Ok(Json(token))
}
