/// API routes and handlers
pub mod auth;
pub mod checkins;
pub mod health;
pub mod pairs;
pub mod reports;
pub mod tree;
pub mod upload;
pub mod users;

use crate::context::AppContext;
use axum::Router;
use serde::Deserialize;

/// Query string for pair-scoped routes
#[derive(Debug, Clone, Deserialize)]
pub struct PairQuery {
    pub pair_id: String,
}

/// Build the `/api/v1` routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/users", users::routes())
        .nest("/pairs", pairs::routes())
        .nest("/checkins", checkins::routes())
        .nest("/reports", reports::routes())
        .nest("/tree", tree::routes())
        .nest("/upload", upload::routes())
}
