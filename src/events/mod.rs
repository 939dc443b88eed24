pub mod event_consumer;
pub mod event_models;
pub mod event_publisher;

pub use event_consumer::{EventConsumer, EventStream, ReadFrom, RedisEventStream};
pub use event_models::{DomainEvent, EventEnvelope, EventError, EventType};
pub use event_publisher::{EventPublisher, EventSink, NoopSink, RedisStreamSink};
