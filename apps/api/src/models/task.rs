use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A published challenge task. Read-only to the scoring core.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub name: String,
    pub question: String,
    pub ideal_prompt: String,
    pub image_url: Option<String>,
    /// Calendar day the task is scheduled for; `None` means not part of any daily set.
    pub active_day: Option<NaiveDate>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
