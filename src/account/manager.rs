/// Account manager using runtime queries
use crate::{
    account::{RegisterRequest, TokenResponse},
    auth::{hash_password, issue_token, verify_password},
    config::ServerConfig,
    db::{is_unique_violation, models::User},
    error::{AppError, AppResult},
    metrics,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const USER_COLUMNS: &str = "id, email, nickname, password_hash, avatar_url, created_at";

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Register a new user and issue their first token
    pub async fn register(&self, request: RegisterRequest) -> AppResult<TokenResponse> {
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        if self.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::Validation("email already registered".to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let user_id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO users (id, email, nickname, password_hash, avatar_url, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
        )
        .bind(&user_id)
        .bind(&email)
        .bind(request.nickname.trim())
        .bind(&password_hash)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation("email already registered".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        tracing::info!("Registered user {}", user_id);
        metrics::record_registration();

        let token = issue_token(&user_id, &self.config.authentication)?;
        Ok(TokenResponse::bearer(token))
    }

    /// Password login
    pub async fn login(&self, email: &str, password: &str) -> AppResult<TokenResponse> {
        let invalid = || AppError::Authentication("incorrect email or password".to_string());

        let user = self
            .get_user_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }

        let token = issue_token(&user.id, &self.config.authentication)?;
        Ok(TokenResponse::bearer(token))
    }

    /// Get user by id
    pub async fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// Get user by (normalized) email
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = ?1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// Set the avatar to a previously uploaded image
    pub async fn update_avatar(&self, user_id: &str, avatar_url: &str) -> AppResult<User> {
        let avatar_url = avatar_url.trim();
        if !avatar_url.starts_with("/uploads/images/") || avatar_url.contains("..") {
            return Err(AppError::Validation(
                "avatar must be an uploaded image".to_string(),
            ));
        }

        let result = sqlx::query("UPDATE users SET avatar_url = ?1 WHERE id = ?2")
            .bind(avatar_url)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user not found".to_string()));
        }

        self.get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))
    }
}
