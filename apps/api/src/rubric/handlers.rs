use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::rubric::{self, Criterion};
use crate::state::AppState;

#[derive(Serialize)]
pub struct CriteriaResponse {
    pub data: Vec<Criterion>,
}

/// GET /api/v1/criteria
pub async fn handle_get_criteria(
    State(state): State<AppState>,
) -> Result<Json<CriteriaResponse>, AppError> {
    let data = rubric::load_rubric(&state.db).await?;
    Ok(Json(CriteriaResponse { data }))
}
