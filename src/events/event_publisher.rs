use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::event_models::{DomainEvent, EventEnvelope, EventError};
use crate::state::BrokerConfig;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport the publisher hands encoded envelopes to.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, topic: &str, key: Option<&str>, value: &str) -> Result<(), EventError>;
}

/// Appends each event to a Redis stream named after the topic.
///
/// The connection is opened on the first send. A failed connect is not
/// remembered, so the next send tries again.
pub struct RedisStreamSink {
    client: redis::Client,
    conn: Mutex<Option<ConnectionManager>>,
}

impl RedisStreamSink {
    /// Only parses the URL; nothing is dialed here.
    pub fn new(url: &str) -> Result<Self, EventError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, EventError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = ConnectionManager::new(self.client.clone()).await?;
        info!("Connected to event broker");
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl EventSink for RedisStreamSink {
    async fn send(&self, topic: &str, key: Option<&str>, value: &str) -> Result<(), EventError> {
        let mut conn = self.connection().await?;
        let fields = [("key", key.unwrap_or_default()), ("payload", value)];
        let _: String = conn.xadd(topic, "*", &fields).await?;
        Ok(())
    }
}

/// Used when no broker is configured.
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn send(&self, topic: &str, _key: Option<&str>, _value: &str) -> Result<(), EventError> {
        debug!("Event publishing disabled, dropping event for topic {}", topic);
        Ok(())
    }
}

/// Fire-and-forget publisher called after a write has committed.
///
/// Publishing never fails the caller: encoding and transport errors are
/// logged and swallowed. Each call makes exactly one send attempt.
#[derive(Clone)]
pub struct EventPublisher {
    sink: Arc<dyn EventSink>,
    topic: String,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn EventSink>, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: topic.into(),
        }
    }

    pub fn noop(topic: impl Into<String>) -> Self {
        Self::new(Arc::new(NoopSink), topic)
    }

    /// Picks the transport once, at startup. No-op mode is chosen only when
    /// no broker URL is configured; an unreachable broker fails each send.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, EventError> {
        let Some(url) = config.url.as_deref() else {
            info!("EVENT_BROKER_URL not set, event publishing is disabled");
            return Ok(Self::noop(config.topic.clone()));
        };

        let sink = RedisStreamSink::new(url)?;
        info!("Publishing events to topic {}", config.topic);
        Ok(Self::new(Arc::new(sink), config.topic.clone()))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the event id when the broker accepted the message.
    pub async fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        event_type: &str,
        payload: Map<String, Value>,
    ) -> Option<Uuid> {
        let envelope = EventEnvelope::new(event_type, payload);
        let value = match envelope.encode() {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to encode {} event: {:?}", event_type, e);
                return None;
            }
        };

        match tokio::time::timeout(PUBLISH_TIMEOUT, self.sink.send(topic, key, &value)).await {
            Ok(Ok(())) => {
                debug!(
                    "Published {} event {} to topic {}",
                    event_type, envelope.event_id, topic
                );
                Some(envelope.event_id)
            }
            Ok(Err(e)) => {
                error!("Failed to send event to topic {}: {:?}", topic, e);
                None
            }
            Err(_) => {
                error!("Timed out sending event to topic {}", topic);
                None
            }
        }
    }

    /// Publishes to the configured topic, keyed by the addressed user.
    pub async fn publish_event(&self, event: &DomainEvent) -> Option<Uuid> {
        let Some(kind) = event.event_type() else {
            warn!("Refusing to publish untyped event: {:?}", event);
            return None;
        };
        let key = event.user_id().map(|id| id.to_string());

        self.publish(&self.topic, key.as_deref(), kind.as_str(), event.payload())
            .await
    }

    pub async fn course_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Option<Uuid> {
        self.publish_event(&DomainEvent::CourseEnrolled { user_id, course_id })
            .await
    }

    pub async fn assignment_graded(
        &self,
        user_id: Uuid,
        assignment_id: Uuid,
        grade: Option<i32>,
        feedback: Option<String>,
    ) -> Option<Uuid> {
        self.publish_event(&DomainEvent::AssignmentGraded {
            user_id,
            assignment_id,
            grade: grade.map(Number::from),
            feedback,
        })
        .await
    }

    pub async fn group_member_added(&self, user_id: Uuid, group_id: Uuid) -> Option<Uuid> {
        self.publish_event(&DomainEvent::GroupMemberAdded { user_id, group_id })
            .await
    }
}
