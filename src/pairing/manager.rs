/// Pairing manager
use crate::{
    db::{
        is_unique_violation,
        models::{Pair, PairStatus, PairType},
    },
    error::{AppError, AppResult},
    pairing::{UnbindResolution, UnbindStatus},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Days the requester must wait before ending a pair unilaterally
pub const UNBIND_COOLING_OFF_DAYS: i64 = 7;

const INVITE_CODE_ATTEMPTS: usize = 8;

const PAIR_COLUMNS: &str = "id, user_a_id, user_b_id, pair_type, status, invite_code, \
                            unbind_requested_by, unbind_requested_at, created_at";

/// Pairing manager
#[derive(Clone)]
pub struct PairingManager {
    db: SqlitePool,
}

impl PairingManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Generate a 6-digit numeric invite code
    pub fn generate_code() -> String {
        rand::thread_rng().gen_range(100_000..=999_999).to_string()
    }

    /// Create a pending pair owned by `user_id`
    pub async fn create(&self, user_id: &str, pair_type: &str) -> AppResult<Pair> {
        let pair_type = PairType::from_str(pair_type)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        for _ in 0..INVITE_CODE_ATTEMPTS {
            let code = Self::generate_code();
            let inserted = sqlx::query(
                "INSERT INTO pairs (id, user_a_id, user_b_id, pair_type, status, invite_code, created_at)
                 VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6)",
            )
            .bind(&id)
            .bind(user_id)
            .bind(pair_type.as_str())
            .bind(PairStatus::Pending.as_str())
            .bind(&code)
            .bind(now)
            .execute(&self.db)
            .await;

            match inserted {
                Ok(_) => {
                    tracing::info!("Pair {} created by {}", id, user_id);
                    return self.get_required(&id).await;
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!("Invite code collision, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal(
            "could not allocate a unique invite code".to_string(),
        ))
    }

    /// Join a pending pair by invite code
    pub async fn join(&self, user_id: &str, invite_code: &str) -> AppResult<Pair> {
        let code = invite_code.trim();
        let pair = sqlx::query_as::<_, Pair>(&format!(
            "SELECT {} FROM pairs WHERE invite_code = ?1 AND status = ?2",
            PAIR_COLUMNS
        ))
        .bind(code)
        .bind(PairStatus::Pending.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("invalid invite code".to_string()))?;

        if pair.user_a_id == user_id {
            return Err(AppError::Validation("cannot pair with yourself".to_string()));
        }

        // Conditional on still pending so two joiners cannot both win
        let result = sqlx::query(
            "UPDATE pairs SET user_b_id = ?1, status = ?2 WHERE id = ?3 AND status = ?4",
        )
        .bind(user_id)
        .bind(PairStatus::Active.as_str())
        .bind(&pair.id)
        .bind(PairStatus::Pending.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("invalid invite code".to_string()));
        }

        tracing::info!("User {} joined pair {}", user_id, pair.id);
        self.get_required(&pair.id).await
    }

    /// Pending and active pairs the user belongs to
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Pair>> {
        let pairs = sqlx::query_as::<_, Pair>(&format!(
            "SELECT {} FROM pairs
             WHERE (user_a_id = ?1 OR user_b_id = ?1) AND status IN (?2, ?3)
             ORDER BY created_at DESC",
            PAIR_COLUMNS
        ))
        .bind(user_id)
        .bind(PairStatus::Pending.as_str())
        .bind(PairStatus::Active.as_str())
        .fetch_all(&self.db)
        .await?;

        Ok(pairs)
    }

    /// Get pair by id
    pub async fn get(&self, pair_id: &str) -> AppResult<Option<Pair>> {
        let pair = sqlx::query_as::<_, Pair>(&format!(
            "SELECT {} FROM pairs WHERE id = ?1",
            PAIR_COLUMNS
        ))
        .bind(pair_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(pair)
    }

    async fn get_required(&self, pair_id: &str) -> AppResult<Pair> {
        self.get(pair_id)
            .await?
            .ok_or_else(|| AppError::NotFound("pair not found".to_string()))
    }

    /// Active pair the user belongs to, if any
    async fn find_active_for_member(&self, user_id: &str, pair_id: &str) -> AppResult<Option<Pair>> {
        Ok(self
            .get(pair_id)
            .await?
            .filter(|p| p.status == PairStatus::Active && p.is_member(user_id)))
    }

    /// Pair must be active and the user a member
    pub async fn require_active_member(&self, user_id: &str, pair_id: &str) -> AppResult<Pair> {
        self.find_active_for_member(user_id, pair_id)
            .await?
            .ok_or_else(|| AppError::Authorization("you are not a member of this pair".to_string()))
    }

    /// User must be a member, any status
    pub async fn require_member(&self, user_id: &str, pair_id: &str) -> AppResult<Pair> {
        self.get(pair_id)
            .await?
            .filter(|p| p.is_member(user_id))
            .ok_or_else(|| AppError::Authorization("you are not a member of this pair".to_string()))
    }

    /// Open an unbind request on an active pair
    pub async fn request_unbind(
        &self,
        user_id: &str,
        pair_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Pair> {
        let pair = self
            .find_active_for_member(user_id, pair_id)
            .await?
            .ok_or_else(|| AppError::NotFound("pair not found".to_string()))?;

        if pair.unbind_requested_by.is_some() {
            return Err(AppError::Validation(
                "an unbind request is already in progress".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE pairs SET unbind_requested_by = ?1, unbind_requested_at = ?2
             WHERE id = ?3 AND unbind_requested_by IS NULL",
        )
        .bind(user_id)
        .bind(now)
        .bind(pair_id)
        .execute(&self.db)
        .await?;

        tracing::info!("Unbind requested on pair {} by {}", pair_id, user_id);
        self.get_required(pair_id).await
    }

    /// Confirm an open unbind request
    pub async fn confirm_unbind(
        &self,
        user_id: &str,
        pair_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<UnbindResolution> {
        let pair = self
            .find_active_for_member(user_id, pair_id)
            .await?
            .ok_or_else(|| AppError::NotFound("pair not found".to_string()))?;

        let requested_by = pair
            .unbind_requested_by
            .as_deref()
            .ok_or_else(|| AppError::Validation("no pending unbind request".to_string()))?;

        let resolution = if requested_by != user_id {
            UnbindResolution::MutualConsent
        } else {
            let elapsed = days_elapsed(pair.unbind_requested_at, now);
            if elapsed < UNBIND_COOLING_OFF_DAYS {
                return Err(AppError::Validation(format!(
                    "cooling-off period not over, {} more day(s) to wait (or ask your partner to confirm)",
                    UNBIND_COOLING_OFF_DAYS - elapsed
                )));
            }
            UnbindResolution::CoolingOffElapsed
        };

        sqlx::query(
            "UPDATE pairs SET status = ?1, unbind_requested_by = NULL, unbind_requested_at = NULL
             WHERE id = ?2",
        )
        .bind(PairStatus::Ended.as_str())
        .bind(pair_id)
        .execute(&self.db)
        .await?;

        tracing::info!("Pair {} ended ({:?})", pair_id, resolution);
        Ok(resolution)
    }

    /// Withdraw an unbind request; only the requester may
    pub async fn cancel_unbind(&self, user_id: &str, pair_id: &str) -> AppResult<()> {
        let pair = self
            .find_active_for_member(user_id, pair_id)
            .await?
            .ok_or_else(|| AppError::NotFound("pair not found".to_string()))?;

        if pair.unbind_requested_by.as_deref() != Some(user_id) {
            return Err(AppError::Authorization(
                "only the requester can cancel the unbind request".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE pairs SET unbind_requested_by = NULL, unbind_requested_at = NULL WHERE id = ?1",
        )
        .bind(pair_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Current unbind state for the user
    pub async fn unbind_status(
        &self,
        user_id: &str,
        pair_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<UnbindStatus> {
        let Some(pair) = self.find_active_for_member(user_id, pair_id).await? else {
            return Ok(UnbindStatus::default());
        };
        let Some(requested_by) = pair.unbind_requested_by.as_deref() else {
            return Ok(UnbindStatus::default());
        };

        let elapsed = days_elapsed(pair.unbind_requested_at, now);
        Ok(UnbindStatus {
            has_request: true,
            requested_by_me: Some(requested_by == user_id),
            days_elapsed: Some(elapsed),
            days_remaining: Some((UNBIND_COOLING_OFF_DAYS - elapsed).max(0)),
            can_force_unbind: Some(elapsed >= UNBIND_COOLING_OFF_DAYS),
        })
    }
}

fn days_elapsed(requested_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    requested_at
        .map(|at| (now - at).num_days().max(0))
        .unwrap_or(0)
}
