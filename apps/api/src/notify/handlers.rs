use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::notify::digest;
use crate::state::AppState;

/// POST /api/v1/users/:user_id/send-results
pub async fn handle_send_results(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    digest::send_results_email(&state, user_id).await?;
    Ok(Json(json!({ "success": true, "message": "Results sent successfully" })))
}
