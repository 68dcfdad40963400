use std::sync::Arc;

use sqlx::PgPool;

use crate::clock::DayClock;
use crate::config::Config;
use crate::judge::JudgeClient;
use crate::notify::EmailSender;
use crate::submission::queue::JudgeQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub judge: JudgeClient,
    /// Pluggable outbound-mail seam; tests swap in a recording fake.
    pub sender: Arc<dyn EmailSender>,
    /// Single source of "current calendar day" in the configured timezone.
    pub clock: DayClock,
    pub config: Config,
    /// Wake-up channel for the judging worker; the submissions table is the
    /// durable queue.
    pub judge_queue: JudgeQueue,
}
