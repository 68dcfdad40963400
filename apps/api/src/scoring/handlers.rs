use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::scoring::averages::{self, AverageScores};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AveragesQuery {
    pub exclude_user_id: Option<Uuid>,
}

/// GET /api/v1/averages
///
/// Population-wide averages; pass `exclude_user_id` to get the
/// "everyone but me" view.
pub async fn handle_average_scores(
    State(state): State<AppState>,
    Query(query): Query<AveragesQuery>,
) -> Result<Json<AverageScores>, AppError> {
    Ok(Json(
        averages::average_scores(&state.db, query.exclude_user_id).await?,
    ))
}
