//! Composition and broadcast of the two outbound mails: the per-user results
//! summary and the daily challenge digest.

use anyhow::anyhow;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::task::TaskRow;
use crate::models::user::AppUserRow;
use crate::scoring::results::{self, UserResult};
use crate::state::AppState;
use crate::submission::pipeline;
use crate::tasks;
use crate::users;

/// Delay between broadcast sends so the provider is never burst-hit.
const INTER_SEND_DELAY_MS: u64 = 100;

#[derive(Debug)]
pub struct BroadcastReport {
    pub sent: u32,
    pub failed: u32,
}

/// Subject and HTML body for the daily digest.
pub fn compose_daily_digest(
    task_set: &[TaskRow],
    frontend_url: &str,
    today: NaiveDate,
) -> (String, String) {
    let plural = if task_set.len() > 1 { "s" } else { "" };
    let subject = format!("New Daily Challenge{plural} for {today}");

    let mut task_blocks = String::new();
    for task in task_set {
        task_blocks.push_str(&format!(
            r#"<div style="background-color:#f8f9fa;padding:20px;border-radius:8px;margin:15px 0;border-left:4px solid #ff9800;">
<h3 style="margin:0 0 10px 0;color:#2c3e50;">{}</h3>
<p style="margin:0;color:#555;">{}</p>
<p style="margin-top:15px;"><a href="{frontend_url}" style="background-color:#ff9800;color:white;padding:10px 20px;text-decoration:none;border-radius:5px;font-weight:bold;">Start Challenge</a></p>
</div>
"#,
            task.name,
            snippet(&task.question, 150),
        ));
    }

    let intro = if task_set.len() == 1 {
        "A new prompt engineering challenge awaits you today!".to_string()
    } else {
        format!(
            "{} new prompt engineering challenges await you today!",
            task_set.len()
        )
    };

    let html = format!(
        r#"<div style="max-width:600px;margin:0 auto;padding:20px;font-family:Arial,sans-serif;color:#333;">
<h1 style="color:#2c3e50;">Prompt Pal</h1>
<p style="font-size:1.1em;">{intro}</p>
{task_blocks}
<p style="text-align:center;margin:40px 0 20px 0;"><a href="{frontend_url}/dashboard" style="background-color:#ff6600;color:white;padding:15px 30px;text-decoration:none;border-radius:8px;font-weight:bold;">Go to Dashboard</a></p>
<p style="color:#7f8c8d;text-align:center;">Challenge yourself daily and become a prompt engineering expert!</p>
</div>"#
    );

    (subject, html)
}

/// Subject and HTML body for the results summary. The overall score reads
/// "Incomplete" until every in-scope task has a judged result.
pub fn compose_results_email(
    display_name: &str,
    result: &UserResult,
    criterion_names: &HashMap<String, String>,
) -> (String, String) {
    let subject = "Your Prompt Engineering Results".to_string();

    let (display_score, score_message) = match result.score {
        Some(score) => (
            format!("{score:.2}"),
            format!("Your overall score: {score:.2}/5"),
        ),
        None => (
            "Incomplete".to_string(),
            "Complete all tasks to see your overall score".to_string(),
        ),
    };

    let mut task_blocks = String::new();
    for task_result in &result.task_results {
        let percentage = results::percentage_score(&task_result.criterion_results);

        let mut criterion_lines = String::new();
        for criterion in &task_result.criterion_results {
            let name = criterion_names
                .get(&criterion.criterion_id)
                .map(String::as_str)
                .unwrap_or("Unknown criterion");
            criterion_lines.push_str(&format!(
                "<p style=\"margin:5px 0;\"><strong>{name}:</strong> {:.1}/5</p>\n",
                criterion.score
            ));
            for subquestion in &criterion.subquestion_results {
                if !subquestion.feedback.is_empty() {
                    criterion_lines.push_str(&format!(
                        "<p style=\"margin:2px 0 2px 20px;color:#555;\">&bull; {}</p>\n",
                        subquestion.feedback
                    ));
                }
            }
        }

        task_blocks.push_str(&format!(
            r#"<div style="margin-bottom:20px;padding:20px;border:1px solid #e0e0e0;border-radius:8px;">
<p style="font-size:1.2em;"><strong>Score:</strong> {percentage}%</p>
{criterion_lines}</div>
"#
        ));
    }

    let html = format!(
        r#"<div style="max-width:800px;margin:0 auto;padding:20px;font-family:Arial,sans-serif;color:#333;">
<h1 style="color:#2c3e50;">Prompt Engineering Results</h1>
<p>Hello {display_name},</p>
<div style="background:#6c5ce7;color:white;padding:30px;border-radius:10px;text-align:center;margin-bottom:30px;">
<h2 style="margin:0 0 10px 0;">Overall Score</h2>
<p style="font-size:3em;margin:0;font-weight:bold;">{display_score}</p>
</div>
<h2 style="color:#2c3e50;">Detailed Results</h2>
{task_blocks}
<p style="color:#7f8c8d;text-align:center;">{score_message}</p>
<p style="color:#7f8c8d;text-align:center;">Thank you for participating in the prompt engineering assessment!</p>
</div>"#
    );

    (subject, html)
}

/// Composes and sends the results summary for one user.
pub async fn send_results_email(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    let user = users::find_user(&state.db, user_id).await?;
    let result = pipeline::user_results(&state.db, user_id).await?;

    if result.task_results.is_empty() {
        return Err(AppError::Validation(
            "No task results yet; complete at least one task to receive a results e-mail"
                .to_string(),
        ));
    }

    let criterion_names = load_criterion_names(state).await?;
    let display_name = display_name(&user);
    let (subject, html) = compose_results_email(display_name, &result, &criterion_names);

    state
        .sender
        .send(&user.email, &subject, &html)
        .await
        .map_err(|e| AppError::Internal(anyhow!("Results e-mail to {} failed: {e}", user.email)))
}

/// Sends the daily digest to every user, sequentially with a small delay.
/// A per-recipient failure is logged and counted; the loop always runs to the
/// end. Skipped entirely when no task is scheduled for today.
pub async fn broadcast_daily_digest(state: &AppState) -> Result<BroadcastReport, AppError> {
    let task_set = tasks::active_tasks_for_today(&state.db, &state.clock).await?;
    if task_set.is_empty() {
        info!("No tasks scheduled for today; skipping digest broadcast");
        return Ok(BroadcastReport { sent: 0, failed: 0 });
    }

    let recipients: Vec<AppUserRow> =
        sqlx::query_as("SELECT * FROM app_users ORDER BY created_at")
            .fetch_all(&state.db)
            .await?;

    let (subject, html) =
        compose_daily_digest(&task_set, &state.config.frontend_url, state.clock.today());

    info!(
        "Broadcasting daily digest to {} users ({} tasks)",
        recipients.len(),
        task_set.len()
    );

    let mut sent = 0;
    let mut failed = 0;
    for user in recipients {
        match state.sender.send(&user.email, &subject, &html).await {
            Ok(()) => sent += 1,
            Err(e) => {
                failed += 1;
                error!("Failed to send digest to {}: {e}", user.email);
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(INTER_SEND_DELAY_MS)).await;
    }

    info!("Daily digest broadcast finished: {sent} sent, {failed} failed");
    Ok(BroadcastReport { sent, failed })
}

async fn load_criterion_names(state: &AppState) -> Result<HashMap<String, String>, AppError> {
    let rows: Vec<(Uuid, String)> = sqlx::query_as("SELECT id, name FROM criteria")
        .fetch_all(&state.db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, name)| (id.to_string(), name))
        .collect())
}

fn display_name(user: &AppUserRow) -> &str {
    if user.name.is_empty() {
        user.email.split('@').next().unwrap_or(&user.email)
    } else {
        &user.name
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::results::{CriterionResult, SubquestionResult, TaskResult};
    use chrono::Utc;

    fn sample_task(name: &str, question: &str) -> TaskRow {
        TaskRow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            question: question.to_string(),
            ideal_prompt: String::new(),
            image_url: None,
            active_day: None,
            published_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_digest_lists_every_task_and_links_dashboard() {
        let task_set = vec![
            sample_task("Summarize", "Write a summarization prompt."),
            sample_task("Translate", "Write a translation prompt."),
        ];
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (subject, html) = compose_daily_digest(&task_set, "https://promptpal.app", today);

        assert!(subject.contains("Challenges"));
        assert!(subject.contains("2024-06-01"));
        assert!(html.contains("Summarize"));
        assert!(html.contains("Translate"));
        assert!(html.contains("https://promptpal.app/dashboard"));
    }

    #[test]
    fn test_digest_subject_singular_for_one_task() {
        let task_set = vec![sample_task("Summarize", "q")];
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (subject, _) = compose_daily_digest(&task_set, "http://localhost", today);
        assert!(subject.contains("Challenge for"));
        assert!(!subject.contains("Challenges"));
    }

    #[test]
    fn test_long_questions_are_snipped() {
        let question = "x".repeat(400);
        let task_set = vec![sample_task("Long", &question)];
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let (_, html) = compose_daily_digest(&task_set, "http://localhost", today);
        assert!(!html.contains(&question));
        assert!(html.contains(&format!("{}...", "x".repeat(150))));
    }

    fn sample_result(score: Option<f64>) -> UserResult {
        UserResult {
            score,
            task_results: vec![TaskResult {
                task_id: Uuid::new_v4(),
                submission_id: Uuid::new_v4(),
                submitted_at: Utc::now(),
                score: 4.0,
                criterion_results: vec![CriterionResult {
                    criterion_id: "crit-1".to_string(),
                    score: 4.0,
                    subquestion_results: vec![SubquestionResult {
                        subquestion_id: "sq-1".to_string(),
                        score: 4.0,
                        feedback: "Clear and specific.".to_string(),
                    }],
                }],
            }],
        }
    }

    #[test]
    fn test_results_email_shows_overall_score_and_feedback() {
        let mut names = HashMap::new();
        names.insert("crit-1".to_string(), "Clarity".to_string());

        let (subject, html) = compose_results_email("Ada", &sample_result(Some(4.0)), &names);
        assert_eq!(subject, "Your Prompt Engineering Results");
        assert!(html.contains("Ada"));
        assert!(html.contains("4.00"));
        assert!(html.contains("Clarity"));
        assert!(html.contains("Clear and specific."));
        // one criterion at 4.0 of 5 -> 80%
        assert!(html.contains("80%"));
    }

    #[test]
    fn test_results_email_incomplete_without_full_task_set() {
        let (_, html) = compose_results_email("Ada", &sample_result(None), &HashMap::new());
        assert!(html.contains("Incomplete"));
        assert!(html.contains("Complete all tasks"));
        assert!(html.contains("Unknown criterion"));
    }
}
