/// Relationship tree manager
use crate::{
    db::models::RelationshipTree,
    error::{AppError, AppResult},
    tree::{checkin_points, next_threshold, progress_percent, TreeLevel, TreeStatus, WaterOutcome},
};
use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::SqlitePool;

/// Points added by a daily watering
pub const WATER_POINTS: i64 = 5;

/// Tree manager
#[derive(Clone)]
pub struct TreeManager {
    db: SqlitePool,
}

impl TreeManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Load the pair's tree, creating it on first access
    pub async fn get_or_create(&self, pair_id: &str) -> AppResult<RelationshipTree> {
        sqlx::query(
            "INSERT OR IGNORE INTO relationship_trees (pair_id, growth_points, level, milestones, updated_at)
             VALUES (?1, 0, ?2, '[]', ?3)",
        )
        .bind(pair_id)
        .bind(TreeLevel::Seed.as_str())
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        let tree = sqlx::query_as::<_, RelationshipTree>(
            "SELECT pair_id, growth_points, level, milestones, last_watered, updated_at
             FROM relationship_trees WHERE pair_id = ?1",
        )
        .bind(pair_id)
        .fetch_one(&self.db)
        .await?;

        Ok(tree)
    }

    /// Current tree status
    pub async fn status(&self, pair_id: &str, today: NaiveDate) -> AppResult<TreeStatus> {
        let tree = self.get_or_create(pair_id).await?;
        let level = TreeLevel::for_points(tree.growth_points);

        Ok(TreeStatus {
            growth_points: tree.growth_points,
            level,
            level_name: level.display_name().to_string(),
            level_emoji: level.emoji().to_string(),
            next_level_at: next_threshold(tree.growth_points),
            progress_percent: progress_percent(tree.growth_points),
            milestones: tree.milestones.0,
            last_watered: tree.last_watered,
            can_water: tree.last_watered != Some(today),
        })
    }

    /// Water the tree, at most once per pair per day
    pub async fn water(&self, pair_id: &str, today: NaiveDate) -> AppResult<WaterOutcome> {
        self.get_or_create(pair_id).await?;

        // Conditional so concurrent waterings cannot both land
        let result = sqlx::query(
            "UPDATE relationship_trees
             SET growth_points = growth_points + ?1, last_watered = ?2, updated_at = ?3
             WHERE pair_id = ?4 AND (last_watered IS NULL OR last_watered <> ?2)",
        )
        .bind(WATER_POINTS)
        .bind(today)
        .bind(Utc::now())
        .bind(pair_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(
                "already watered today, come back tomorrow".to_string(),
            ));
        }

        let (growth_points, level, level_up) = self.apply_level(pair_id, today).await?;
        Ok(WaterOutcome {
            growth_points,
            level,
            level_name: level.display_name().to_string(),
            level_emoji: level.emoji().to_string(),
            points_added: WATER_POINTS,
            level_up,
        })
    }

    /// Add check-in growth; returns the points added
    pub async fn grow_on_checkin(
        &self,
        pair_id: &str,
        partner_done: bool,
        streak: i64,
        today: NaiveDate,
    ) -> AppResult<i64> {
        self.get_or_create(pair_id).await?;
        let points = checkin_points(partner_done, streak);

        sqlx::query(
            "UPDATE relationship_trees SET growth_points = growth_points + ?1, updated_at = ?2
             WHERE pair_id = ?3",
        )
        .bind(points)
        .bind(Utc::now())
        .bind(pair_id)
        .execute(&self.db)
        .await?;

        let (growth_points, level, level_up) = self.apply_level(pair_id, today).await?;
        if level_up {
            tracing::info!("Tree of pair {} reached {} ({} points)", pair_id, level.as_str(), growth_points);
        }
        Ok(points)
    }

    /// Sync the stored level with the points, recording a milestone on change
    async fn apply_level(&self, pair_id: &str, today: NaiveDate) -> AppResult<(i64, TreeLevel, bool)> {
        let tree = self.get_or_create(pair_id).await?;
        let level = TreeLevel::for_points(tree.growth_points);

        if TreeLevel::parse(&tree.level) == Some(level) {
            return Ok((tree.growth_points, level, false));
        }

        let mut milestones = tree.milestones.0;
        milestones.push(json!({
            "type": "level_up",
            "level": level.as_str(),
            "date": today.to_string(),
        }));

        // Guarded on the old level so a racing update records the milestone once
        let result = sqlx::query(
            "UPDATE relationship_trees SET level = ?1, milestones = ?2, updated_at = ?3
             WHERE pair_id = ?4 AND level = ?5",
        )
        .bind(level.as_str())
        .bind(serde_json::to_string(&milestones)?)
        .bind(Utc::now())
        .bind(pair_id)
        .bind(&tree.level)
        .execute(&self.db)
        .await?;

        Ok((tree.growth_points, level, result.rows_affected() > 0))
    }
}
