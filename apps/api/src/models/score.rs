use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Persisted best score for one (user, task) pair.
///
/// `attempts` increments on every re-evaluation; `score`, `percentage_score`,
/// `submission_id` and `completed_at` are only overwritten when a new attempt
/// scores strictly higher, so the recorded score never decreases.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskScoreRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub score: f64,
    pub percentage_score: i32,
    pub attempts: i32,
    pub is_completed: bool,
    pub completed_at: DateTime<Utc>,
    pub submission_id: Uuid,
}
