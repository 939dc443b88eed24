use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

const RESERVED_KEYS: [&str; 3] = ["event_id", "event_type", "occurred_at"];

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("Broker error: {0}")]
    Broker(#[from] redis::RedisError),
}

/// Tags shared by bus events and notification rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    CourseEnrolled,
    AssignmentGraded,
    GroupMemberAdded,
    AssignmentDeadline6h,
    AssignmentDeadline1h,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CourseEnrolled => "course_enrolled",
            EventType::AssignmentGraded => "assignment_graded",
            EventType::GroupMemberAdded => "group_member_added",
            EventType::AssignmentDeadline6h => "assignment_deadline_6h",
            EventType::AssignmentDeadline1h => "assignment_deadline_1h",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course_enrolled" => Ok(EventType::CourseEnrolled),
            "assignment_graded" => Ok(EventType::AssignmentGraded),
            "group_member_added" => Ok(EventType::GroupMemberAdded),
            "assignment_deadline_6h" => Ok(EventType::AssignmentDeadline6h),
            "assignment_deadline_1h" => Ok(EventType::AssignmentDeadline1h),
            other => Err(format!("unknown event type: {}", other)),
        }
    }
}

/// Wire message placed on the event bus.
///
/// Payload keys are merged into the top-level JSON object next to
/// `event_id`, `event_type` and `occurred_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, mut payload: Map<String, Value>) -> Self {
        for key in RESERVED_KEYS {
            payload.remove(key);
        }

        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<String, EventError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EventError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Typed view of the envelope. Types outside the bus set come back as
    /// [`DomainEvent::Unknown`]; missing or unparsable identifiers are errors.
    pub fn domain_event(&self) -> Result<DomainEvent, EventError> {
        let kind = match self.event_type.parse::<EventType>() {
            Ok(kind) => kind,
            Err(_) => return Ok(DomainEvent::Unknown(self.event_type.clone())),
        };

        match kind {
            EventType::CourseEnrolled => Ok(DomainEvent::CourseEnrolled {
                user_id: self.uuid_field("user_id")?,
                course_id: self.uuid_field("course_id")?,
            }),
            EventType::AssignmentGraded => Ok(DomainEvent::AssignmentGraded {
                user_id: self.uuid_field("user_id")?,
                assignment_id: self.uuid_field("assignment_id")?,
                grade: self.number_field("grade"),
                feedback: self
                    .payload
                    .get("feedback")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            EventType::GroupMemberAdded => Ok(DomainEvent::GroupMemberAdded {
                user_id: self.uuid_field("user_id")?,
                group_id: self.uuid_field("group_id")?,
            }),
            // Reminders are written straight to the store, never published.
            EventType::AssignmentDeadline6h | EventType::AssignmentDeadline1h => {
                Ok(DomainEvent::Unknown(self.event_type.clone()))
            }
        }
    }

    fn uuid_field(&self, field: &'static str) -> Result<Uuid, EventError> {
        match self.payload.get(field) {
            None | Some(Value::Null) => Err(EventError::MissingField(field)),
            Some(Value::String(s)) if s.is_empty() => Err(EventError::MissingField(field)),
            Some(Value::String(s)) => Uuid::parse_str(s).map_err(|_| EventError::InvalidField {
                field,
                value: s.clone(),
            }),
            Some(other) => Err(EventError::InvalidField {
                field,
                value: other.to_string(),
            }),
        }
    }

    fn number_field(&self, field: &str) -> Option<Number> {
        match self.payload.get(field)? {
            Value::Number(n) => Some(n.clone()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    CourseEnrolled {
        user_id: Uuid,
        course_id: Uuid,
    },
    AssignmentGraded {
        user_id: Uuid,
        assignment_id: Uuid,
        grade: Option<Number>,
        feedback: Option<String>,
    },
    GroupMemberAdded {
        user_id: Uuid,
        group_id: Uuid,
    },
    Unknown(String),
}

impl DomainEvent {
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            DomainEvent::CourseEnrolled { .. } => Some(EventType::CourseEnrolled),
            DomainEvent::AssignmentGraded { .. } => Some(EventType::AssignmentGraded),
            DomainEvent::GroupMemberAdded { .. } => Some(EventType::GroupMemberAdded),
            DomainEvent::Unknown(_) => None,
        }
    }

    /// User the event is addressed to; also the bus routing key.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            DomainEvent::CourseEnrolled { user_id, .. }
            | DomainEvent::AssignmentGraded { user_id, .. }
            | DomainEvent::GroupMemberAdded { user_id, .. } => Some(*user_id),
            DomainEvent::Unknown(_) => None,
        }
    }

    pub fn payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        match self {
            DomainEvent::CourseEnrolled { user_id, course_id } => {
                payload.insert("user_id".into(), Value::String(user_id.to_string()));
                payload.insert("course_id".into(), Value::String(course_id.to_string()));
            }
            DomainEvent::AssignmentGraded {
                user_id,
                assignment_id,
                grade,
                feedback,
            } => {
                payload.insert("user_id".into(), Value::String(user_id.to_string()));
                payload.insert(
                    "assignment_id".into(),
                    Value::String(assignment_id.to_string()),
                );
                payload.insert(
                    "grade".into(),
                    grade.clone().map(Value::Number).unwrap_or(Value::Null),
                );
                payload.insert(
                    "feedback".into(),
                    feedback.clone().map(Value::String).unwrap_or(Value::Null),
                );
            }
            DomainEvent::GroupMemberAdded { user_id, group_id } => {
                payload.insert("user_id".into(), Value::String(user_id.to_string()));
                payload.insert("group_id".into(), Value::String(group_id.to_string()));
            }
            DomainEvent::Unknown(_) => {}
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> EventEnvelope {
        EventEnvelope::decode(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_event_type_round_trips_through_tag() {
        for kind in [
            EventType::CourseEnrolled,
            EventType::AssignmentGraded,
            EventType::GroupMemberAdded,
            EventType::AssignmentDeadline6h,
            EventType::AssignmentDeadline1h,
        ] {
            assert_eq!(kind.as_str().parse::<EventType>().unwrap(), kind);
        }
        assert!("quiz_passed".parse::<EventType>().is_err());
    }

    #[test]
    fn test_payload_is_merged_at_top_level() {
        let user_id = Uuid::new_v4();
        let course_id = Uuid::new_v4();
        let event = DomainEvent::CourseEnrolled { user_id, course_id };
        let envelope = EventEnvelope::new("course_enrolled", event.payload());

        let wire: Value = serde_json::from_str(&envelope.encode().unwrap()).unwrap();
        assert_eq!(wire["event_type"], "course_enrolled");
        assert_eq!(wire["event_id"], envelope.event_id.to_string());
        assert_eq!(wire["user_id"], user_id.to_string());
        assert_eq!(wire["course_id"], course_id.to_string());
        assert!(wire.get("payload").is_none());
        assert!(wire["occurred_at"].as_str().is_some());
    }

    #[test]
    fn test_reserved_keys_in_payload_are_dropped() {
        let mut payload = Map::new();
        payload.insert("event_type".into(), json!("spoofed"));
        payload.insert("event_id".into(), json!("not-a-uuid"));

        let envelope = EventEnvelope::new("group_member_added", payload);
        assert_eq!(envelope.event_type, "group_member_added");
        assert!(envelope.payload.is_empty());

        let decoded = EventEnvelope::decode(envelope.encode().unwrap().as_bytes()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_decode_assignment_graded() {
        let user_id = Uuid::new_v4();
        let assignment_id = Uuid::new_v4();
        let envelope = envelope(json!({
            "event_id": Uuid::new_v4(),
            "event_type": "assignment_graded",
            "occurred_at": "2026-02-16T10:00:00Z",
            "user_id": user_id,
            "assignment_id": assignment_id,
            "grade": 95,
            "feedback": "Well done",
            "graded_by": Uuid::new_v4(),
        }));

        match envelope.domain_event().unwrap() {
            DomainEvent::AssignmentGraded {
                user_id: u,
                assignment_id: a,
                grade,
                feedback,
            } => {
                assert_eq!(u, user_id);
                assert_eq!(a, assignment_id);
                assert_eq!(grade.unwrap().to_string(), "95");
                assert_eq!(feedback.as_deref(), Some("Well done"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_type_is_not_an_error() {
        let envelope = envelope(json!({
            "event_id": Uuid::new_v4(),
            "event_type": "quiz_passed",
            "occurred_at": "2026-02-16T10:00:00Z",
            "user_id": Uuid::new_v4(),
        }));

        assert_eq!(
            envelope.domain_event().unwrap(),
            DomainEvent::Unknown("quiz_passed".into())
        );
    }

    #[test]
    fn test_missing_and_invalid_identifiers() {
        let missing = envelope(json!({
            "event_id": Uuid::new_v4(),
            "event_type": "course_enrolled",
            "occurred_at": "2026-02-16T10:00:00Z",
            "user_id": Uuid::new_v4(),
            "course_id": null,
        }));
        assert!(matches!(
            missing.domain_event(),
            Err(EventError::MissingField("course_id"))
        ));

        let invalid = envelope(json!({
            "event_id": Uuid::new_v4(),
            "event_type": "group_member_added",
            "occurred_at": "2026-02-16T10:00:00Z",
            "user_id": "42",
            "group_id": Uuid::new_v4(),
        }));
        assert!(matches!(
            invalid.domain_event(),
            Err(EventError::InvalidField { field: "user_id", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(EventEnvelope::decode(b"not json").is_err());
        assert!(EventEnvelope::decode(br#"{"event_type":"course_enrolled"}"#).is_err());
    }
}
