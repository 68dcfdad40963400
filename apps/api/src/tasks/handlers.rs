use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::task::TaskRow;
use crate::state::AppState;
use crate::tasks;
use crate::users;

#[derive(Serialize)]
pub struct TaskListResponse {
    pub data: Vec<TaskRow>,
}

/// GET /api/v1/tasks/today
pub async fn handle_today_tasks(
    State(state): State<AppState>,
) -> Result<Json<TaskListResponse>, AppError> {
    let data = tasks::active_tasks_for_today(&state.db, &state.clock).await?;
    Ok(Json(TaskListResponse { data }))
}

/// GET /api/v1/tasks/:task_id
pub async fn handle_get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskRow>, AppError> {
    Ok(Json(tasks::find_task(&state.db, task_id).await?))
}

/// GET /api/v1/users/:user_id/tasks
pub async fn handle_user_tasks(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<TaskListResponse>, AppError> {
    let user = users::find_user(&state.db, user_id).await?;
    let data = tasks::tasks_for_user(&state.db, &user).await?;
    Ok(Json(TaskListResponse { data }))
}
