use chrono::Utc;
use learning_notifications::{
    course::PgCatalogRepository,
    db::{create_pool, run_migrations},
    init_tracing,
    notification::{start_deadline_notifier, DeadlineNotifier, PgNotificationRepository},
    shutdown_signal,
    state::Config,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    let notifier = DeadlineNotifier::new(
        Arc::new(PgNotificationRepository::new(db.clone())),
        Arc::new(PgCatalogRepository::new(db.clone())),
    );

    // The scheduler's first tick comes one interval after start.
    match notifier.scan(Utc::now()).await {
        Ok(created) => tracing::info!("Initial deadline scan created {} reminders", created),
        Err(e) => tracing::error!("Initial deadline scan failed: {:?}", e),
    }

    let mut scheduler = start_deadline_notifier(notifier, config.deadline_poll_interval).await?;

    let mut shutdown = shutdown_signal();
    let _ = shutdown.wait_for(|stop| *stop).await;

    scheduler.shutdown().await?;
    db.close().await;
    tracing::info!("Deadline notifier stopped");

    Ok(())
}
