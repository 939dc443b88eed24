use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::course::course_repository::CatalogRepository;
use crate::events::EventPublisher;
use crate::notification::notification_repository::NotificationRepository;

pub const DEFAULT_EVENT_TOPIC: &str = "notifications-events";
pub const DEFAULT_CONSUMER_GROUP: &str = "notifications-service";
pub const DEFAULT_CONSUMER_NAME: &str = "notifications-consumer";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub publisher: EventPublisher,
    pub notification_repository: Arc<dyn NotificationRepository>,
    pub catalog_repository: Arc<dyn CatalogRepository>,
}

/// Settings shared by the API server and both workers.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub broker: BrokerConfig,
    pub deadline_poll_interval: Duration,
}

/// HTTP-only settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
}

/// Event bus settings shared by the publisher and the consumer.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// `None` switches the publisher into no-op mode.
    pub url: Option<String>,
    pub topic: String,
    pub consumer_group: String,
    pub consumer_name: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let poll_secs: u64 = std::env::var("DEADLINE_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_SECS.to_string())
            .parse()
            .context("DEADLINE_POLL_INTERVAL_SECS must be a number")?;
        if poll_secs == 0 {
            anyhow::bail!("DEADLINE_POLL_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            database_url,
            broker: BrokerConfig::from_env(),
            deadline_poll_interval: Duration::from_secs(poll_secs),
        })
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a number")?,
        })
    }
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        let url = std::env::var("EVENT_BROKER_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Self {
            url,
            topic: std::env::var("EVENT_TOPIC")
                .unwrap_or_else(|_| DEFAULT_EVENT_TOPIC.to_string()),
            consumer_group: std::env::var("EVENT_CONSUMER_GROUP")
                .unwrap_or_else(|_| DEFAULT_CONSUMER_GROUP.to_string()),
            // Must survive restarts so the pending list is picked up again.
            consumer_name: std::env::var("EVENT_CONSUMER_NAME")
                .or_else(|_| std::env::var("HOSTNAME"))
                .unwrap_or_else(|_| DEFAULT_CONSUMER_NAME.to_string()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            url: None,
            topic: DEFAULT_EVENT_TOPIC.to_string(),
            consumer_group: DEFAULT_CONSUMER_GROUP.to_string(),
            consumer_name: DEFAULT_CONSUMER_NAME.to_string(),
        }
    }
}
