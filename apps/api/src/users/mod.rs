pub mod handlers;

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::AppUserRow;

pub async fn find_user(pool: &PgPool, user_id: Uuid) -> Result<AppUserRow, AppError> {
    sqlx::query_as::<_, AppUserRow>("SELECT * FROM app_users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
}

pub async fn find_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AppUserRow>, AppError> {
    Ok(
        sqlx::query_as::<_, AppUserRow>("SELECT * FROM app_users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn create_user(pool: &PgPool, email: &str, name: &str) -> Result<AppUserRow, AppError> {
    if find_user_by_email(pool, email).await?.is_some() {
        return Err(AppError::Validation(format!(
            "A user with email {email} already exists"
        )));
    }

    Ok(sqlx::query_as::<_, AppUserRow>(
        "INSERT INTO app_users (email, name) VALUES ($1, $2) RETURNING *",
    )
    .bind(email)
    .bind(name)
    .fetch_one(pool)
    .await?)
}
