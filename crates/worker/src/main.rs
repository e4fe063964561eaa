use pgqueue::clock::SystemClock;
use pgqueue::jobs::JobsRepo;
use pgqueue::{config::Config, db, worker as loop_};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use worker::handlers::build_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::from_env()?;

    tracing::info!(
        worker_id = %cfg.worker_id,
        lease_seconds = cfg.lease_seconds,
        poll_interval_ms = cfg.poll_interval_ms,
        migrate_on_startup = cfg.migrate_on_startup,
        "pgqueue worker starting"
    );

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let jobs = JobsRepo::new(pool);
    let registry = build_registry();
    let clock = SystemClock;

    let shutdown = Box::pin(async {
        let _ = tokio::signal::ctrl_c().await;
    });

    loop_::run_forever(
        jobs,
        registry,
        &clock,
        &cfg.worker_id,
        cfg.lease_seconds,
        Duration::from_millis(cfg.poll_interval_ms),
        shutdown,
    )
    .await?;

    tracing::info!("pgqueue worker stopped");
    Ok(())
}
