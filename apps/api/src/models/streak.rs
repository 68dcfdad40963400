use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-user consecutive-day completion counter. Created lazily on first use.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserStreakRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_completed_days: i32,
    pub last_completion_date: Option<NaiveDate>,
    pub streak_start_date: Option<NaiveDate>,
}
