use std::sync::Arc;
use tracing::{debug, info};

use super::notification_models::{NewNotification, Notification};
use super::notification_repository::NotificationRepository;
use crate::course::course_repository::CatalogRepository;
use crate::error::Result;
use crate::events::{DomainEvent, EventEnvelope};

#[derive(Debug)]
pub enum Outcome {
    Created(Notification),
    /// The event id was already materialized (redelivery).
    Duplicate,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnknownEventType,
    MalformedPayload,
    MissingEntity,
}

/// Turns bus events into notification rows.
#[derive(Clone)]
pub struct NotificationMaterializer {
    notifications: Arc<dyn NotificationRepository>,
    catalog: Arc<dyn CatalogRepository>,
}

impl NotificationMaterializer {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            notifications,
            catalog,
        }
    }

    /// Handles one event. Only storage failures are errors; anything the
    /// event itself is wrong about ends in [`Outcome::Skipped`].
    pub async fn handle(&self, envelope: &EventEnvelope) -> Result<Outcome> {
        let event = match envelope.domain_event() {
            Ok(event) => event,
            Err(e) => {
                debug!(
                    "Skipping malformed {} event {}: {}",
                    envelope.event_type, envelope.event_id, e
                );
                return Ok(Outcome::Skipped(SkipReason::MalformedPayload));
            }
        };

        let Some(draft) = self.render(&event).await? else {
            return Ok(match event {
                DomainEvent::Unknown(_) => Outcome::Skipped(SkipReason::UnknownEventType),
                _ => Outcome::Skipped(SkipReason::MissingEntity),
            });
        };

        let draft = draft.with_source_event(envelope.event_id);
        match self.notifications.insert_event_notification(draft).await? {
            Some(notification) => {
                info!(
                    "Created {} notification {} for user {}",
                    notification.notification_type, notification.id, notification.user_id
                );
                Ok(Outcome::Created(notification))
            }
            None => {
                debug!("Event {} was already materialized", envelope.event_id);
                Ok(Outcome::Duplicate)
            }
        }
    }

    async fn render(&self, event: &DomainEvent) -> Result<Option<NewNotification>> {
        let draft = match event {
            DomainEvent::CourseEnrolled { user_id, course_id } => self
                .catalog
                .find_course(*course_id)
                .await?
                .map(|course| NewNotification::course_enrolled(*user_id, &course)),
            DomainEvent::AssignmentGraded {
                user_id,
                assignment_id,
                grade,
                ..
            } => self
                .catalog
                .find_assignment(*assignment_id)
                .await?
                .map(|assignment| {
                    NewNotification::assignment_graded(*user_id, &assignment, grade.as_ref())
                }),
            DomainEvent::GroupMemberAdded { user_id, group_id } => self
                .catalog
                .find_group(*group_id)
                .await?
                .map(|group| NewNotification::group_member_added(*user_id, &group)),
            DomainEvent::Unknown(event_type) => {
                debug!("Ignoring event type {}", event_type);
                None
            }
        };

        Ok(draft)
    }
}
