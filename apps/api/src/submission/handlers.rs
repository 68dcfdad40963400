use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::scoring::results::UserResult;
use crate::state::AppState;
use crate::submission::pipeline;

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub task_id: Uuid,
    pub solution_prompt: String,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub submission_id: Uuid,
}

/// POST /api/v1/users/:user_id/submissions
///
/// Accepts the submission and returns before judging happens; clients poll
/// results or wait for the streak/score to update.
pub async fn handle_submit(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let submission_id =
        pipeline::submit_solution(&state, user_id, req.task_id, &req.solution_prompt).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { submission_id })))
}

/// POST /api/v1/submissions/:submission_id/check
///
/// Manually re-enqueues a submission for judging. Already-scored submissions
/// are a no-op in the pipeline, so this is always safe to call.
pub async fn handle_check_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    pipeline::find_submission(&state.db, submission_id).await?;
    state.judge_queue.enqueue(submission_id);
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/users/:user_id/results
pub async fn handle_user_results(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResult>, AppError> {
    Ok(Json(pipeline::user_results(&state.db, user_id).await?))
}
