use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AppUserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// Cached aggregate score across the user's task set. Derived — the
    /// recompute-on-read path in the submission pipeline is authoritative.
    pub result_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}
