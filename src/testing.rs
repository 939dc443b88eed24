//! In-memory repositories for unit tests. They mirror the Postgres unique
//! indexes on `source_event_id` and on deadline reminders.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::course::course_models::{Assignment, Course, Group};
use crate::course::course_repository::CatalogRepository;
use crate::error::{AppError, Result};
use crate::events::EventType;
use crate::notification::notification_models::{NewNotification, Notification};
use crate::notification::notification_repository::NotificationRepository;

#[derive(Default)]
pub struct InMemoryNotifications {
    rows: Mutex<Vec<Notification>>,
    fail_writes: AtomicBool,
}

impl InMemoryNotifications {
    pub fn all(&self) -> Vec<Notification> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn seed(&self, user_id: Uuid, title: &str, is_read: bool) -> Notification {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            notification_type: "test_event".to_string(),
            title: title.to_string(),
            body: None,
            entity_type: None,
            entity_id: None,
            source_event_id: None,
            is_read,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(notification.clone());
        notification
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn conflicts(rows: &[Notification], candidate: &NewNotification) -> bool {
        let is_reminder = matches!(
            candidate.notification_type,
            EventType::AssignmentDeadline6h | EventType::AssignmentDeadline1h
        );

        rows.iter().any(|row| {
            let same_event = candidate.source_event_id.is_some()
                && row.source_event_id == candidate.source_event_id;
            let same_reminder = is_reminder
                && row.user_id == candidate.user_id
                && row.notification_type == candidate.notification_type.as_str()
                && row.entity_type.as_deref() == Some(candidate.entity_type.as_str())
                && row.entity_id == Some(candidate.entity_id);
            same_event || same_reminder
        })
    }

    fn materialize(candidate: NewNotification) -> Notification {
        let now = Utc::now();
        Notification {
            id: Uuid::new_v4(),
            user_id: candidate.user_id,
            notification_type: candidate.notification_type.as_str().to_string(),
            title: candidate.title,
            body: candidate.body,
            entity_type: Some(candidate.entity_type.as_str().to_string()),
            entity_id: Some(candidate.entity_id),
            source_event_id: candidate.source_event_id,
            is_read: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotifications {
    async fn list(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|n| n.id == id && n.user_id == user_id) {
            Some(notification) => {
                notification.is_read = true;
                notification.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let mut updated = 0;
        for notification in rows.iter_mut().filter(|n| n.user_id == user_id && !n.is_read) {
            notification.is_read = true;
            notification.updated_at = Utc::now();
            updated += 1;
        }
        Ok(updated)
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|n| n.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }

    async fn insert_event_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        if Self::conflicts(&rows, &notification) {
            return Ok(None);
        }
        let row = Self::materialize(notification);
        rows.push(row.clone());
        Ok(Some(row))
    }

    async fn insert_reminders(&self, reminders: Vec<NewNotification>) -> Result<u64> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let mut created = 0;
        for reminder in reminders {
            if Self::conflicts(&rows, &reminder) {
                continue;
            }
            rows.push(Self::materialize(reminder));
            created += 1;
        }
        Ok(created)
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    courses: Mutex<Vec<Course>>,
    assignments: Mutex<Vec<Assignment>>,
    groups: Mutex<Vec<Group>>,
    enrollments: Mutex<Vec<(Uuid, Uuid)>>,
}

impl InMemoryCatalog {
    pub fn add_course(&self, title: &str, enrollment_code: &str) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            title: title.to_string(),
            enrollment_code: enrollment_code.to_string(),
        };
        self.courses.lock().unwrap().push(course.clone());
        course
    }

    pub fn rename_course(&self, id: Uuid, title: &str) {
        if let Some(course) = self.courses.lock().unwrap().iter_mut().find(|c| c.id == id) {
            course.title = title.to_string();
        }
    }

    pub fn add_assignment(
        &self,
        course_id: Uuid,
        title: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> Assignment {
        let assignment = Assignment {
            id: Uuid::new_v4(),
            course_id,
            title: title.to_string(),
            due_date,
        };
        self.assignments.lock().unwrap().push(assignment.clone());
        assignment
    }

    pub fn add_group(&self, name: &str) -> Group {
        let group = Group {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.groups.lock().unwrap().push(group.clone());
        group
    }

    pub fn add_enrollment(&self, user_id: Uuid, course_id: Uuid) {
        self.enrollments.lock().unwrap().push((user_id, course_id));
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_course(&self, id: Uuid) -> Result<Option<Course>> {
        Ok(self.courses.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn find_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>> {
        Ok(self.groups.lock().unwrap().iter().find(|g| g.id == id).cloned())
    }

    async fn assignments_due_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Assignment>> {
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| matches!(a.due_date, Some(due) if due > after && due <= until))
            .cloned()
            .collect())
    }

    async fn enrolled_user_ids(&self, course_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, course)| *course == course_id)
            .map(|(user, _)| *user)
            .collect())
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .contains(&(user_id, course_id)))
    }

    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
        let mut enrollments = self.enrollments.lock().unwrap();
        if enrollments.contains(&(user_id, course_id)) {
            return Ok(false);
        }
        enrollments.push((user_id, course_id));
        Ok(true)
    }
}
