use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One submitted solution prompt.
///
/// `result` holds the raw structured judge reply and is written exactly once.
/// `scored_at` marks that the reply has been folded into task scores, streaks
/// and the user aggregate — re-applying a submission with `scored_at` set is a
/// no-op, which makes the judging queue safe under at-least-once delivery.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubmissionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub solution_prompt: String,
    pub result: Option<Value>,
    pub scored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
