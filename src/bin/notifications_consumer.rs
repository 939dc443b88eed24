use anyhow::Context;
use learning_notifications::{
    course::PgCatalogRepository,
    db::{create_pool, run_migrations},
    events::EventConsumer,
    init_tracing,
    notification::{NotificationMaterializer, PgNotificationRepository},
    shutdown_signal,
    state::Config,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    if config.broker.url.is_none() {
        anyhow::bail!("EVENT_BROKER_URL must be set to run the notifications consumer");
    }

    tracing::info!("Connecting to database...");
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    let materializer = NotificationMaterializer::new(
        Arc::new(PgNotificationRepository::new(db.clone())),
        Arc::new(PgCatalogRepository::new(db.clone())),
    );

    let consumer = EventConsumer::connect(&config.broker, materializer)
        .await
        .context("Failed to connect to event broker")?;

    consumer.run(shutdown_signal()).await?;
    db.close().await;

    Ok(())
}
