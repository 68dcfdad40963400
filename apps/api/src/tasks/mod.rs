pub mod handlers;

use sqlx::PgPool;
use uuid::Uuid;

use crate::clock::DayClock;
use crate::errors::AppError;
use crate::models::task::TaskRow;
use crate::models::user::AppUserRow;

pub async fn find_task(pool: &PgPool, task_id: Uuid) -> Result<TaskRow, AppError> {
    sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1 AND published_at IS NOT NULL")
        .bind(task_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Task {task_id} not found")))
}

/// Daily Task Selector: published tasks scheduled for the current calendar
/// day in the configured timezone. The comparison is between plain dates, so
/// a task scheduled for "2024-06-01" is active exactly on that local day and
/// never bleeds across a UTC midnight boundary. Unscheduled tasks are never
/// part of a daily set.
pub async fn active_tasks_for_today(
    pool: &PgPool,
    clock: &DayClock,
) -> Result<Vec<TaskRow>, AppError> {
    Ok(sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT * FROM tasks
        WHERE published_at IS NOT NULL AND active_day = $1
        ORDER BY created_at
        "#,
    )
    .bind(clock.today())
    .fetch_all(pool)
    .await?)
}

/// The user's in-scope task set for aggregate scoring: published tasks that
/// predate the user record.
pub async fn tasks_for_user(pool: &PgPool, user: &AppUserRow) -> Result<Vec<TaskRow>, AppError> {
    Ok(sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT * FROM tasks
        WHERE published_at IS NOT NULL AND published_at < $1
        ORDER BY published_at
        "#,
    )
    .bind(user.created_at)
    .fetch_all(pool)
    .await?)
}
