pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::judge::handlers as judge_handlers;
use crate::notify::handlers as notify_handlers;
use crate::rubric::handlers as rubric_handlers;
use crate::scoring::handlers as scoring_handlers;
use crate::state::AppState;
use crate::streak::handlers as streak_handlers;
use crate::submission::handlers as submission_handlers;
use crate::tasks::handlers as task_handlers;
use crate::users::handlers as user_handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Users
        .route("/api/v1/users", post(user_handlers::handle_create_user))
        .route(
            "/api/v1/users/:user_id/tasks",
            get(task_handlers::handle_user_tasks),
        )
        .route(
            "/api/v1/users/:user_id/results",
            get(submission_handlers::handle_user_results),
        )
        .route(
            "/api/v1/users/:user_id/submissions",
            post(submission_handlers::handle_submit),
        )
        .route(
            "/api/v1/users/:user_id/send-results",
            post(notify_handlers::handle_send_results),
        )
        // Streaks
        .route(
            "/api/v1/users/:user_id/streak",
            get(streak_handlers::handle_get_streak),
        )
        .route(
            "/api/v1/users/:user_id/streak/resync",
            post(streak_handlers::handle_resync_streak),
        )
        .route(
            "/api/v1/streaks/leaderboard",
            get(streak_handlers::handle_leaderboard),
        )
        // Tasks
        .route("/api/v1/tasks/today", get(task_handlers::handle_today_tasks))
        .route("/api/v1/tasks/:task_id", get(task_handlers::handle_get_task))
        // Rubric & aggregates
        .route(
            "/api/v1/criteria",
            get(rubric_handlers::handle_get_criteria),
        )
        .route(
            "/api/v1/averages",
            get(scoring_handlers::handle_average_scores),
        )
        // Judging
        .route(
            "/api/v1/submissions/:submission_id/check",
            post(submission_handlers::handle_check_submission),
        )
        .route(
            "/api/v1/judge/images",
            post(judge_handlers::handle_evaluate_images),
        )
        .with_state(state)
}
