use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::rubric;
use crate::state::AppState;
use crate::tasks;

#[derive(Deserialize)]
pub struct ImageEvaluationRequest {
    pub task_id: Uuid,
    pub user_image_url: String,
    pub expected_image_url: String,
}

/// POST /api/v1/judge/images
///
/// Compares a user-generated image against the reference image for a task and
/// returns the raw structured evaluation (per-criterion scores plus an
/// optional overall similarity percentage).
pub async fn handle_evaluate_images(
    State(state): State<AppState>,
    Json(req): Json<ImageEvaluationRequest>,
) -> Result<Json<Value>, AppError> {
    let task = tasks::find_task(&state.db, req.task_id).await?;
    let rubric = rubric::load_rubric_required(&state.db).await?;
    let schema = rubric::build_image_response_schema(&rubric);

    let evaluation = state
        .judge
        .evaluate_image_pair(
            &task,
            &rubric,
            &schema,
            &req.user_image_url,
            &req.expected_image_url,
        )
        .await
        .map_err(|e| AppError::Judge(e.to_string()))?;

    Ok(Json(evaluation))
}
