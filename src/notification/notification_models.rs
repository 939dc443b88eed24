use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::course::course_models::{Assignment, Course, Group};
use crate::events::EventType;

use super::deadline_service::ReminderTier;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub body: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    #[serde(skip)]
    pub source_event_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Course,
    Assignment,
    Group,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Course => "course",
            EntityType::Assignment => "assignment",
            EntityType::Group => "group",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification ready to be inserted. Title and body are rendered here,
/// once, from the entity as it looks at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: EventType,
    pub title: String,
    pub body: Option<String>,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub source_event_id: Option<Uuid>,
}

impl NewNotification {
    pub fn course_enrolled(user_id: Uuid, course: &Course) -> Self {
        Self {
            user_id,
            notification_type: EventType::CourseEnrolled,
            title: "New course".to_string(),
            body: Some(format!(
                "You have been enrolled in the course \"{}\"",
                course.title
            )),
            entity_type: EntityType::Course,
            entity_id: course.id,
            source_event_id: None,
        }
    }

    pub fn assignment_graded(user_id: Uuid, assignment: &Assignment, grade: Option<&Number>) -> Self {
        let body = match grade {
            Some(grade) => format!(
                "Your assignment \"{}\" was graded: {}",
                assignment.title, grade
            ),
            None => format!("Your assignment \"{}\" was graded", assignment.title),
        };

        Self {
            user_id,
            notification_type: EventType::AssignmentGraded,
            title: "Assignment graded".to_string(),
            body: Some(body),
            entity_type: EntityType::Assignment,
            entity_id: assignment.id,
            source_event_id: None,
        }
    }

    pub fn group_member_added(user_id: Uuid, group: &Group) -> Self {
        Self {
            user_id,
            notification_type: EventType::GroupMemberAdded,
            title: "New group".to_string(),
            body: Some(format!("You have been added to the group \"{}\"", group.name)),
            entity_type: EntityType::Group,
            entity_id: group.id,
            source_event_id: None,
        }
    }

    pub fn deadline_reminder(user_id: Uuid, assignment: &Assignment, tier: ReminderTier) -> Self {
        let (title, lead) = match tier {
            ReminderTier::SixHours => ("Assignment deadline soon", "6 hours"),
            ReminderTier::OneHour => ("Assignment deadline is close", "1 hour"),
        };

        Self {
            user_id,
            notification_type: tier.event_type(),
            title: title.to_string(),
            body: Some(format!(
                "The deadline for the assignment \"{}\" is in {}",
                assignment.title, lead
            )),
            entity_type: EntityType::Assignment,
            entity_id: assignment.id,
            source_event_id: None,
        }
    }

    pub fn with_source_event(mut self, event_id: Uuid) -> Self {
        self.source_event_id = Some(event_id);
        self
    }
}
