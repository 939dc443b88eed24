use anyhow::Context;
use learning_notifications::{
    course::PgCatalogRepository,
    db::{create_pool, run_migrations},
    events::EventPublisher,
    init_tracing,
    notification::PgNotificationRepository,
    routes::create_router,
    shutdown_signal,
    state::{AppState, Config, ServerConfig},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let server_config = Arc::new(ServerConfig::from_env()?);

    tracing::info!("Connecting to database...");
    let db = create_pool(&config.database_url).await?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    // Broker strategy is resolved once here; without a URL publishing is a no-op.
    let publisher =
        EventPublisher::from_config(&config.broker).context("Invalid EVENT_BROKER_URL")?;

    let state = AppState {
        config: server_config.clone(),
        publisher,
        notification_repository: Arc::new(PgNotificationRepository::new(db.clone())),
        catalog_repository: Arc::new(PgCatalogRepository::new(db.clone())),
    };

    let app = create_router(state);

    let addr = format!("{}:{}", server_config.host, server_config.port);
    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let mut shutdown = shutdown_signal();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    Ok(())
}
