/// Launch progress
///
/// Onboarding checklist state per user. Rows are written by the onboarding
/// flow; this crate only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LaunchProgress {
    pub user_id: Uuid,
    pub points: i32,
    pub completed_steps: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl LaunchProgress {
    /// Progress for a user who has not started yet
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            points: 0,
            completed_steps: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn has_completed(&self, step: &str) -> bool {
        self.completed_steps.iter().any(|s| s == step)
    }

    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LaunchProgress>(
            "SELECT user_id, points, completed_steps, updated_at FROM launch_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Leaderboard order: most points first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LaunchProgress>(
            "SELECT user_id, points, completed_steps, updated_at FROM launch_progress \
             ORDER BY points DESC, updated_at ASC",
        )
        .fetch_all(pool)
        .await
    }
}
