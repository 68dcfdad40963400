//! Average-Score Aggregator: population-wide means per task and per rubric
//! criterion, optionally excluding one user so a client can show
//! "you vs. everyone else".

use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::scoring::results;

#[derive(Debug, Serialize)]
pub struct TaskAverage {
    pub task_id: Uuid,
    pub average_score: f64,
    pub submissions: i64,
}

#[derive(Debug, Serialize)]
pub struct CriterionAverage {
    pub criterion_id: String,
    pub average_score: f64,
    pub samples: i64,
}

#[derive(Debug, Serialize)]
pub struct AverageScores {
    pub task_averages: Vec<TaskAverage>,
    pub criteria_averages: Vec<CriterionAverage>,
}

/// Scans all completed task scores and computes per-task mean scores plus
/// per-criterion means re-derived from each contributing submission's raw
/// judge reply. A malformed stored reply is skipped with a warning; it must
/// never abort the whole batch.
pub async fn average_scores(
    pool: &PgPool,
    exclude_user_id: Option<Uuid>,
) -> Result<AverageScores, AppError> {
    let rows: Vec<(Uuid, f64, Option<Value>)> = sqlx::query_as(
        r#"
        SELECT ts.task_id, ts.score, s.result
        FROM task_scores ts
        JOIN submissions s ON s.id = ts.submission_id
        WHERE ts.is_completed
          AND ($1::uuid IS NULL OR ts.user_id <> $1)
        "#,
    )
    .bind(exclude_user_id)
    .fetch_all(pool)
    .await?;

    let mut task_sums: HashMap<Uuid, (f64, i64)> = HashMap::new();
    let mut criterion_sums: HashMap<String, (f64, i64)> = HashMap::new();

    for (task_id, score, reply) in rows {
        let entry = task_sums.entry(task_id).or_insert((0.0, 0));
        entry.0 += score;
        entry.1 += 1;

        let Some(reply) = reply else {
            continue;
        };
        match results::criterion_scores(&reply) {
            Ok(scores) => {
                for (criterion_id, criterion_score) in scores {
                    let entry = criterion_sums.entry(criterion_id).or_insert((0.0, 0));
                    entry.0 += criterion_score;
                    entry.1 += 1;
                }
            }
            Err(e) => {
                warn!("Skipping malformed stored judge reply for task {task_id}: {e}");
            }
        }
    }

    let mut task_averages: Vec<TaskAverage> = task_sums
        .into_iter()
        .map(|(task_id, (sum, count))| TaskAverage {
            task_id,
            average_score: sum / count.max(1) as f64,
            submissions: count,
        })
        .collect();
    task_averages.sort_by_key(|a| a.task_id);

    let mut criteria_averages: Vec<CriterionAverage> = criterion_sums
        .into_iter()
        .map(|(criterion_id, (sum, count))| CriterionAverage {
            criterion_id,
            average_score: sum / count.max(1) as f64,
            samples: count,
        })
        .collect();
    criteria_averages.sort_by(|a, b| a.criterion_id.cmp(&b.criterion_id));

    Ok(AverageScores {
        task_averages,
        criteria_averages,
    })
}
