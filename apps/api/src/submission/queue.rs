//! Judging queue. The durable record is the `submissions` table itself
//! (`scored_at IS NULL` = pending); the channel only wakes the worker. A
//! periodic sweep re-enqueues anything that slipped through, so delivery is
//! at-least-once across crashes and the idempotent pipeline absorbs replays.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::submission::pipeline;

#[derive(Clone)]
pub struct JudgeQueue {
    tx: UnboundedSender<Uuid>,
}

impl JudgeQueue {
    pub fn new() -> (Self, UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, submission_id: Uuid) {
        if self.tx.send(submission_id).is_err() {
            // Worker gone (shutdown); the recovery sweep picks the row up.
            error!("Judge queue closed; submission {submission_id} left for the recovery sweep");
        }
    }
}

/// Spawns the single judging worker. Submissions are processed sequentially;
/// a failure leaves the row pending and is retried by the sweep.
pub fn spawn_worker(state: AppState, mut rx: UnboundedReceiver<Uuid>) {
    tokio::spawn(async move {
        while let Some(submission_id) = rx.recv().await {
            if let Err(e) = pipeline::process_submission(&state, submission_id).await {
                error!("Judging submission {submission_id} failed: {e}");
            }
        }
    });
}

/// Re-enqueues submissions that have sat unscored for a couple of minutes,
/// recovering work lost to crashes or judge failures.
pub async fn requeue_stale(state: &AppState) -> Result<u64, AppError> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM submissions
        WHERE scored_at IS NULL
          AND created_at < now() - interval '2 minutes'
        ORDER BY created_at
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    for (submission_id,) in &rows {
        state.judge_queue.enqueue(*submission_id);
    }

    if !rows.is_empty() {
        info!("Re-enqueued {} stale submissions", rows.len());
    }
    Ok(rows.len() as u64)
}
