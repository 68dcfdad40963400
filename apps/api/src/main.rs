mod clock;
mod config;
mod db;
mod errors;
mod judge;
mod models;
mod notify;
mod routes;
mod rubric;
mod scoring;
mod state;
mod streak;
mod submission;
mod tasks;
mod users;

use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::clock::DayClock;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::judge::JudgeClient;
use crate::notify::HttpEmailSender;
use crate::routes::build_router;
use crate::state::AppState;
use crate::submission::queue::{self, JudgeQueue};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.rust_log.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Prompt Pal API v{}", env!("CARGO_PKG_VERSION"));

    let clock = DayClock::from_tz_name(&config.timezone)
        .ok_or_else(|| anyhow!("APP_TIMEZONE '{}' is not a known IANA timezone", config.timezone))?;
    info!("Challenge day rolls over in {}", config.timezone);

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    // Initialize judge client
    let judge = JudgeClient::new(config.openai_api_key.clone());
    info!("Judge client initialized (model: {})", judge::TEXT_MODEL);

    // Initialize e-mail sender
    let sender = Arc::new(HttpEmailSender::new(
        config.email_api_url.clone(),
        config.email_api_key.clone(),
        config.email_from.clone(),
    ));

    // Build app state and start the judging worker
    let (judge_queue, judge_rx) = JudgeQueue::new();
    let app_state = AppState {
        db: pool,
        judge,
        sender,
        clock,
        config: config.clone(),
        judge_queue,
    };
    queue::spawn_worker(app_state.clone(), judge_rx);

    // Scheduler: daily digest + streak reset, and the recovery sweep for
    // submissions stuck without a judge result.
    let scheduler = JobScheduler::new().await?;

    let state_for_daily = app_state.clone();
    scheduler
        .add(Job::new_async("0 20 8 * * *", move |_uuid, _l| {
            let state = state_for_daily.clone();
            Box::pin(async move {
                info!("Running daily digest broadcast...");
                if let Err(e) = notify::digest::broadcast_daily_digest(&state).await {
                    error!("Daily digest broadcast failed: {e}");
                }

                info!("Checking for inactive streaks to reset...");
                match streak::engine::reset_inactive_streaks(&state.db, &state.clock).await {
                    Ok(resets) => info!("Streak resets completed: {resets} streaks reset"),
                    Err(e) => error!("Streak reset sweep failed: {e}"),
                }
            })
        })?)
        .await?;

    let state_for_sweep = app_state.clone();
    scheduler
        .add(Job::new_async("0 */5 * * * *", move |_uuid, _l| {
            let state = state_for_sweep.clone();
            Box::pin(async move {
                if let Err(e) = queue::requeue_stale(&state).await {
                    error!("Pending-submission sweep failed: {e}");
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    info!("Scheduler started:");
    info!("  - Daily digest + streak reset: 08:20 UTC");
    info!("  - Pending-submission sweep: every 5 min");

    // Build router
    let app = build_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
