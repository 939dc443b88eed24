use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Value};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use super::event_models::{EventEnvelope, EventError};
use crate::error::Result;
use crate::notification::notification_materializer::NotificationMaterializer;
use crate::state::BrokerConfig;

const BATCH_SIZE: usize = 16;
const BLOCK_MS: usize = 5_000;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
/// Pending entries idle this long belong to a consumer that is gone.
const CLAIM_MIN_IDLE: Duration = Duration::from_secs(60);
const CLAIM_INTERVAL: Duration = Duration::from_secs(30);

/// Which part of the group's stream a read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFrom {
    /// Entries delivered to this consumer but not yet acknowledged.
    Pending,
    /// Entries never delivered to any consumer of the group.
    New,
}

/// Consumer-group view of the event stream.
#[async_trait]
pub trait EventStream: Send {
    async fn ensure_group(&mut self) -> std::result::Result<(), EventError>;

    async fn read(&mut self, from: ReadFrom) -> std::result::Result<Vec<StreamId>, EventError>;

    /// Moves entries pending longer than `min_idle` on any consumer of the
    /// group to this one. Returns how many were moved.
    async fn claim_stale(&mut self, min_idle: Duration) -> std::result::Result<usize, EventError>;

    async fn ack(&mut self, id: &str) -> std::result::Result<(), EventError>;
}

pub struct RedisEventStream {
    conn: ConnectionManager,
    topic: String,
    group: String,
    consumer: String,
}

impl RedisEventStream {
    pub async fn connect(config: &BrokerConfig) -> std::result::Result<Self, EventError> {
        let url = config
            .url
            .as_deref()
            .ok_or(EventError::MissingField("EVENT_BROKER_URL"))?;
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!(
            "Consuming {} as {} in group {}",
            config.topic, config.consumer_name, config.consumer_group
        );
        Ok(Self {
            conn,
            topic: config.topic.clone(),
            group: config.consumer_group.clone(),
            consumer: config.consumer_name.clone(),
        })
    }
}

#[async_trait]
impl EventStream for RedisEventStream {
    async fn ensure_group(&mut self) -> std::result::Result<(), EventError> {
        let created: redis::RedisResult<()> = self
            .conn
            .xgroup_create_mkstream(&self.topic, &self.group, "0")
            .await;

        match created {
            Ok(()) => info!("Created consumer group {} on {}", self.group, self.topic),
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!("Consumer group {} already exists", self.group)
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn read(&mut self, from: ReadFrom) -> std::result::Result<Vec<StreamId>, EventError> {
        let mut options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(BATCH_SIZE);
        let start_id = match from {
            ReadFrom::Pending => "0",
            ReadFrom::New => {
                options = options.block(BLOCK_MS);
                ">"
            }
        };

        let keys = [self.topic.as_str()];
        let ids = [start_id];
        let reply: StreamReadReply = self.conn.xread_options(&keys, &ids, &options).await?;
        Ok(reply.keys.into_iter().flat_map(|key| key.ids).collect())
    }

    async fn claim_stale(&mut self, min_idle: Duration) -> std::result::Result<usize, EventError> {
        let mut cursor = "0-0".to_string();
        let mut claimed = 0;

        loop {
            let reply: Value = redis::cmd("XAUTOCLAIM")
                .arg(&self.topic)
                .arg(&self.group)
                .arg(&self.consumer)
                .arg(min_idle.as_millis() as u64)
                .arg(&cursor)
                .arg("COUNT")
                .arg(BATCH_SIZE)
                .query_async(&mut self.conn)
                .await?;

            let (next, count) = parse_autoclaim(&reply)?;
            claimed += count;
            if next == "0-0" {
                return Ok(claimed);
            }
            cursor = next;
        }
    }

    async fn ack(&mut self, id: &str) -> std::result::Result<(), EventError> {
        let _: i64 = self.conn.xack(&self.topic, &self.group, &[id]).await?;
        Ok(())
    }
}

/// Reads the next cursor and the number of live entries claimed from an
/// XAUTOCLAIM reply. Entries deleted from the stream come back as nil.
fn parse_autoclaim(reply: &Value) -> std::result::Result<(String, usize), EventError> {
    let invalid = || EventError::InvalidField {
        field: "xautoclaim",
        value: format!("{:?}", reply),
    };

    let Value::Bulk(parts) = reply else {
        return Err(invalid());
    };
    let (Some(cursor), Some(Value::Bulk(entries))) = (parts.first(), parts.get(1)) else {
        return Err(invalid());
    };

    let cursor: String = redis::from_redis_value(cursor)?;
    let claimed = entries
        .iter()
        .filter(|entry| matches!(entry, Value::Bulk(_)))
        .count();
    Ok((cursor, claimed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsumerState {
    Idle,
    Fetching,
    Processing,
    Committing,
}

/// Consumer-group reader over the event stream.
///
/// A message is acknowledged only after its notification is committed, so a
/// failure or crash before that point leaves it pending and it is read again.
/// Entries left pending by consumers that went away are claimed periodically.
pub struct EventConsumer {
    stream: Box<dyn EventStream>,
    materializer: NotificationMaterializer,
    state: ConsumerState,
}

impl EventConsumer {
    pub fn new(stream: Box<dyn EventStream>, materializer: NotificationMaterializer) -> Self {
        Self {
            stream,
            materializer,
            state: ConsumerState::Idle,
        }
    }

    pub async fn connect(
        config: &BrokerConfig,
        materializer: NotificationMaterializer,
    ) -> std::result::Result<Self, EventError> {
        let stream = RedisEventStream::connect(config).await?;
        Ok(Self::new(Box::new(stream), materializer))
    }

    fn transition(&mut self, next: ConsumerState) {
        trace!("Consumer state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs until `shutdown` flips to true. The in-flight message is always
    /// finished before returning.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::result::Result<(), EventError> {
        self.stream.ensure_group().await?;

        // Start with whatever this consumer left pending last time.
        let mut replay_pending = true;
        let mut last_claim: Option<Instant> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if last_claim.map_or(true, |at| at.elapsed() >= CLAIM_INTERVAL) {
                last_claim = Some(Instant::now());
                if self.claim_stale().await {
                    replay_pending = true;
                }
            }

            let from = if replay_pending {
                ReadFrom::Pending
            } else {
                ReadFrom::New
            };
            let read = tokio::select! {
                _ = shutdown.changed() => break,
                read = self.fetch(from) => read,
            };

            let messages = match read {
                Ok(messages) => messages,
                Err(e) => {
                    error!("Failed to read from event stream: {:?}", e);
                    if !backoff(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            if messages.is_empty() {
                replay_pending = false;
                continue;
            }

            if let Err(e) = self.process_batch(&messages).await {
                error!("Failed to process message batch: {:?}", e);
                replay_pending = true;
                if !backoff(&mut shutdown).await {
                    break;
                }
            }
        }

        info!("Event consumer stopped");
        Ok(())
    }

    async fn claim_stale(&mut self) -> bool {
        match self.stream.claim_stale(CLAIM_MIN_IDLE).await {
            Ok(0) => false,
            Ok(claimed) => {
                info!("Claimed {} stale pending messages", claimed);
                true
            }
            Err(e) => {
                error!("Failed to claim stale messages: {:?}", e);
                false
            }
        }
    }

    async fn fetch(&mut self, from: ReadFrom) -> std::result::Result<Vec<StreamId>, EventError> {
        self.transition(ConsumerState::Fetching);
        let messages = self.stream.read(from).await;
        self.transition(ConsumerState::Idle);
        messages
    }

    /// Stops at the first failure; that message and the rest stay pending.
    async fn process_batch(&mut self, messages: &[StreamId]) -> Result<()> {
        for message in messages {
            let processed = self.process(message).await;
            self.transition(ConsumerState::Idle);
            processed?;
        }
        Ok(())
    }

    async fn process(&mut self, message: &StreamId) -> Result<()> {
        self.transition(ConsumerState::Processing);
        match envelope_from_message(message) {
            Ok(envelope) => {
                let outcome = self.materializer.handle(&envelope).await?;
                debug!("Message {} handled: {:?}", message.id, outcome);
            }
            // Acked anyway; an undecodable message would otherwise be replayed forever.
            Err(e) => warn!("Dropping undecodable message {}: {}", message.id, e),
        }

        self.transition(ConsumerState::Committing);
        self.stream.ack(&message.id).await?;
        Ok(())
    }
}

/// Waits out the retry backoff. False when shutdown was requested meanwhile.
async fn backoff(shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = shutdown.changed() => false,
        _ = tokio::time::sleep(RETRY_BACKOFF) => true,
    }
}

fn envelope_from_message(message: &StreamId) -> std::result::Result<EventEnvelope, EventError> {
    let payload: String = message
        .get("payload")
        .ok_or(EventError::MissingField("payload"))?;
    EventEnvelope::decode(payload.as_bytes())
}
