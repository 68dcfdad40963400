use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::streak::UserStreakRow;
use crate::state::AppState;
use crate::streak::engine::{self, LeaderboardEntry};
use crate::users;

#[derive(Serialize)]
pub struct StreakResponse {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_completed_days: i32,
    pub last_completion_date: Option<NaiveDate>,
    pub streak_start_date: Option<NaiveDate>,
}

impl From<UserStreakRow> for StreakResponse {
    fn from(row: UserStreakRow) -> Self {
        StreakResponse {
            current_streak: row.current_streak,
            longest_streak: row.longest_streak,
            total_completed_days: row.total_completed_days,
            last_completion_date: row.last_completion_date,
            streak_start_date: row.streak_start_date,
        }
    }
}

/// GET /api/v1/users/:user_id/streak
pub async fn handle_get_streak(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<StreakResponse>, AppError> {
    users::find_user(&state.db, user_id).await?;
    let row = engine::get_streak(&state.db, &state.clock, user_id).await?;
    Ok(Json(row.into()))
}

/// POST /api/v1/users/:user_id/streak/resync
///
/// Manual repair tool: rebuilds the counters from the completion history.
pub async fn handle_resync_streak(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<StreakResponse>, AppError> {
    users::find_user(&state.db, user_id).await?;
    let row = engine::resync_from_history(&state.db, &state.clock, user_id).await?;
    Ok(Json(row.into()))
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/streaks/leaderboard
pub async fn handle_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    Ok(Json(engine::leaderboard(&state.db, limit).await?))
}
