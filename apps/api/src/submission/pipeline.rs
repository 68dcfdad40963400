//! Submission Pipeline: validates and persists submissions, applies judge
//! results to the persisted task-score records with best-attempt-wins
//! semantics, and maintains the cached per-user aggregate.
//!
//! A submission moves Created -> Judging -> Scored (or stays Judging forever
//! on judge failure, until the recovery sweep retries it). `scored_at` marks
//! the Scored state; re-applying an already-scored submission is a no-op, so
//! at-least-once delivery from the queue is safe.

use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::score::TaskScoreRow;
use crate::models::submission::SubmissionRow;
use crate::rubric;
use crate::scoring::results::{self, TaskResult, UserResult};
use crate::state::AppState;
use crate::streak;
use crate::tasks;
use crate::users;

pub const SOLUTION_MIN_NON_WHITESPACE_CHARACTERS: usize = 10;

/// Validates and persists a new submission, then hands it to the judging
/// queue. Returns immediately; the caller never waits for the judge.
pub async fn submit_solution(
    state: &AppState,
    user_id: Uuid,
    task_id: Uuid,
    solution_prompt: &str,
) -> Result<Uuid, AppError> {
    let count = non_whitespace_len(solution_prompt);
    if count < SOLUTION_MIN_NON_WHITESPACE_CHARACTERS {
        return Err(AppError::Validation(format!(
            "Solution should contain at least {SOLUTION_MIN_NON_WHITESPACE_CHARACTERS} \
             non-whitespace characters, found only {count}"
        )));
    }

    users::find_user(&state.db, user_id).await?;
    tasks::find_task(&state.db, task_id).await?;

    let (submission_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO submissions (user_id, task_id, solution_prompt) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(user_id)
    .bind(task_id)
    .bind(solution_prompt)
    .fetch_one(&state.db)
    .await?;

    state.judge_queue.enqueue(submission_id);
    debug!("Accepted submission {submission_id} for user {user_id} on task {task_id}");
    Ok(submission_id)
}

pub async fn find_submission(pool: &PgPool, id: Uuid) -> Result<SubmissionRow, AppError> {
    sqlx::query_as::<_, SubmissionRow>("SELECT * FROM submissions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Submission {id} not found")))
}

/// Runs one submission through judging and aggregation. Idempotent: an
/// already-scored submission returns immediately, and a submission whose
/// judge reply is stored but not yet aggregated (crash between the two steps)
/// skips straight to aggregation without a second judge call.
pub async fn process_submission(state: &AppState, submission_id: Uuid) -> Result<(), AppError> {
    let submission = find_submission(&state.db, submission_id).await?;

    if submission.scored_at.is_some() {
        debug!("Submission {submission_id} already scored; nothing to do");
        return Ok(());
    }

    let reply = match submission.result.clone() {
        Some(reply) => reply,
        None => {
            let task = tasks::find_task(&state.db, submission.task_id).await?;
            let rubric = rubric::load_rubric_required(&state.db).await?;
            let schema = rubric::build_response_schema(&rubric);

            let reply = state
                .judge
                .evaluate_text(&task, &rubric, &schema, &submission.solution_prompt)
                .await
                .map_err(|e| AppError::Judge(e.to_string()))?;

            sqlx::query("UPDATE submissions SET result = $1 WHERE id = $2")
                .bind(&reply)
                .bind(submission.id)
                .execute(&state.db)
                .await?;

            reply
        }
    };

    apply_judge_result(state, &submission, &reply).await
}

/// Folds a judge reply into the persisted records: task score (best attempt
/// wins), streak on first completion, cached user aggregate. The streak and
/// aggregate updates are independent best-effort side effects; a failure in
/// one is logged and never rolls back the others.
pub async fn apply_judge_result(
    state: &AppState,
    submission: &SubmissionRow,
    reply: &Value,
) -> Result<(), AppError> {
    let result = results::task_result(
        submission.task_id,
        submission.id,
        submission.created_at,
        reply,
    )
    .map_err(|e| {
        AppError::Judge(format!(
            "Unusable judge reply for submission {}: {e}",
            submission.id
        ))
    })?;

    let first_completion = upsert_task_score(&state.db, submission, &result).await?;

    if first_completion {
        if let Err(e) =
            streak::engine::register_completion(&state.db, &state.clock, submission.user_id).await
        {
            error!(
                "Streak update failed for user {}: {e}",
                submission.user_id
            );
        }
    }

    if let Err(e) = refresh_user_aggregate(&state.db, submission.user_id).await {
        error!(
            "User aggregate refresh failed for user {}: {e}",
            submission.user_id
        );
    }

    sqlx::query("UPDATE submissions SET scored_at = now() WHERE id = $1")
        .bind(submission.id)
        .execute(&state.db)
        .await?;

    info!(
        "Scored submission {} for user {} on task {}: {:.2}/5",
        submission.id, submission.user_id, submission.task_id, result.score
    );
    Ok(())
}

/// Returns `true` when this was the first completed attempt for the
/// (user, task) pair.
async fn upsert_task_score(
    pool: &PgPool,
    submission: &SubmissionRow,
    result: &TaskResult,
) -> Result<bool, AppError> {
    let percentage = results::percentage_score(&result.criterion_results);

    let existing: Option<TaskScoreRow> =
        sqlx::query_as("SELECT * FROM task_scores WHERE user_id = $1 AND task_id = $2")
            .bind(submission.user_id)
            .bind(submission.task_id)
            .fetch_optional(pool)
            .await?;

    match existing {
        None => {
            // The conflict arm only bumps attempts: losing this race means
            // another evaluation already recorded a score, and the sweep-level
            // guarantee is eventual consistency, not exact attempt counts.
            sqlx::query(
                r#"
                INSERT INTO task_scores
                    (user_id, task_id, score, percentage_score, attempts,
                     is_completed, completed_at, submission_id)
                VALUES ($1, $2, $3, $4, 1, TRUE, now(), $5)
                ON CONFLICT (user_id, task_id)
                    DO UPDATE SET attempts = task_scores.attempts + 1
                "#,
            )
            .bind(submission.user_id)
            .bind(submission.task_id)
            .bind(result.score)
            .bind(percentage)
            .bind(submission.id)
            .execute(pool)
            .await?;
            Ok(true)
        }
        Some(stored) => {
            if keeps_new_score(stored.score, result.score) {
                sqlx::query(
                    r#"
                    UPDATE task_scores
                    SET attempts = attempts + 1,
                        score = $1,
                        percentage_score = $2,
                        completed_at = now(),
                        submission_id = $3
                    WHERE user_id = $4 AND task_id = $5
                    "#,
                )
                .bind(result.score)
                .bind(percentage)
                .bind(submission.id)
                .bind(submission.user_id)
                .bind(submission.task_id)
                .execute(pool)
                .await?;
            } else {
                sqlx::query(
                    "UPDATE task_scores SET attempts = attempts + 1 WHERE user_id = $1 AND task_id = $2",
                )
                .bind(submission.user_id)
                .bind(submission.task_id)
                .execute(pool)
                .await?;
            }
            Ok(false)
        }
    }
}

/// Best-attempt-wins: the stored score is only replaced by a strictly higher
/// one, so it never decreases across re-evaluations.
fn keeps_new_score(stored: f64, new: f64) -> bool {
    new > stored
}

/// Recomputes the User Result from the submission history. This is the
/// authoritative read model; the cached `result_score` column is only an
/// optimization maintained by [`refresh_user_aggregate`].
pub async fn user_results(pool: &PgPool, user_id: Uuid) -> Result<UserResult, AppError> {
    let user = users::find_user(pool, user_id).await?;
    let task_set = tasks::tasks_for_user(pool, &user).await?;

    let submissions: Vec<SubmissionRow> =
        sqlx::query_as("SELECT * FROM submissions WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    let mut results_by_task: HashMap<Uuid, TaskResult> = HashMap::new();
    for submission in submissions {
        let Some(reply) = &submission.result else {
            continue;
        };
        if results_by_task.contains_key(&submission.task_id) {
            // Newest judged submission for the task already captured.
            continue;
        }
        match results::task_result(
            submission.task_id,
            submission.id,
            submission.created_at,
            reply,
        ) {
            Ok(result) => {
                results_by_task.insert(submission.task_id, result);
            }
            Err(e) => {
                warn!("Skipping malformed stored reply on submission {}: {e}", submission.id);
            }
        }
    }

    let task_ids: Vec<Uuid> = task_set.iter().map(|t| t.id).collect();
    Ok(results::user_result(&task_ids, &results_by_task))
}

/// Writes the freshly computed aggregate onto the user record, rounded to
/// two decimals the way clients display it.
pub async fn refresh_user_aggregate(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    let result = user_results(pool, user_id).await?;
    let cached = result.score.map(|s| (s * 100.0).round() / 100.0);

    sqlx::query("UPDATE app_users SET result_score = $1 WHERE id = $2")
        .bind(cached)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

fn non_whitespace_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nine_non_whitespace_characters_is_below_minimum() {
        // 9 visible characters spread across whitespace
        let prompt = " a b c d e f g h i ";
        assert_eq!(non_whitespace_len(prompt), 9);
        assert!(non_whitespace_len(prompt) < SOLUTION_MIN_NON_WHITESPACE_CHARACTERS);
    }

    #[test]
    fn test_exactly_ten_non_whitespace_characters_passes() {
        let prompt = "abcde fghij";
        assert_eq!(non_whitespace_len(prompt), 10);
        assert!(non_whitespace_len(prompt) >= SOLUTION_MIN_NON_WHITESPACE_CHARACTERS);
    }

    #[test]
    fn test_whitespace_only_counts_as_empty() {
        assert_eq!(non_whitespace_len(" \t\n  "), 0);
    }

    #[test]
    fn test_stored_score_is_monotonic_non_decreasing() {
        // attempt A at 60% equivalent (3.0), attempt B lower (2.75): keep A
        assert!(!keeps_new_score(3.0, 2.75));
        // attempt B higher (3.75): replace
        assert!(keeps_new_score(3.0, 3.75));
        // exact tie keeps the earlier attempt
        assert!(!keeps_new_score(3.0, 3.0));
    }
}
