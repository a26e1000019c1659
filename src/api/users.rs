/// Profile endpoints for the signed-in user
use crate::{
    account::UpdateAvatarRequest, auth::AuthUser, context::AppContext, db::models::User,
    error::AppResult,
};
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/me", get(me))
        .route("/me/avatar", put(update_avatar))
}

async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

async fn update_avatar(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Json(req): Json<UpdateAvatarRequest>,
) -> AppResult<Json<User>> {
    let user = ctx
        .account_manager
        .update_avatar(auth.id(), &req.avatar_url)
        .await?;
    Ok(Json(user))
}
