use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::notification_models::NewNotification;
use super::notification_repository::NotificationRepository;
use crate::course::course_repository::CatalogRepository;
use crate::error::Result;
use crate::events::EventType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderTier {
    SixHours,
    OneHour,
}

impl ReminderTier {
    pub const ALL: [ReminderTier; 2] = [ReminderTier::SixHours, ReminderTier::OneHour];

    pub fn window(&self) -> ChronoDuration {
        match self {
            ReminderTier::SixHours => ChronoDuration::hours(6),
            ReminderTier::OneHour => ChronoDuration::hours(1),
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            ReminderTier::SixHours => EventType::AssignmentDeadline6h,
            ReminderTier::OneHour => EventType::AssignmentDeadline1h,
        }
    }

    /// `now < due_date <= now + window`. Past or current deadlines never qualify.
    pub fn is_due(&self, due_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        due_date > now && due_date - now <= self.window()
    }

    fn widest_window() -> ChronoDuration {
        Self::ALL
            .iter()
            .map(ReminderTier::window)
            .max()
            .unwrap_or_else(ChronoDuration::zero)
    }
}

/// Synthesizes deadline reminders straight into the notification store.
#[derive(Clone)]
pub struct DeadlineNotifier {
    notifications: Arc<dyn NotificationRepository>,
    catalog: Arc<dyn CatalogRepository>,
}

impl DeadlineNotifier {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            notifications,
            catalog,
        }
    }

    /// One pass over upcoming deadlines. All reminders of the pass are
    /// written in a single transaction; returns how many were created.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<u64> {
        let horizon = now + ReminderTier::widest_window();
        let assignments = self.catalog.assignments_due_between(now, horizon).await?;

        let mut enrolled: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut reminders = Vec::new();

        for assignment in &assignments {
            let Some(due_date) = assignment.due_date else {
                continue;
            };
            let tiers: Vec<ReminderTier> = ReminderTier::ALL
                .into_iter()
                .filter(|tier| tier.is_due(due_date, now))
                .collect();
            if tiers.is_empty() {
                continue;
            }

            if !enrolled.contains_key(&assignment.course_id) {
                let users = self.catalog.enrolled_user_ids(assignment.course_id).await?;
                enrolled.insert(assignment.course_id, users);
            }
            let users = &enrolled[&assignment.course_id];

            for tier in tiers {
                for user_id in users {
                    reminders.push(NewNotification::deadline_reminder(*user_id, assignment, tier));
                }
            }
        }

        if reminders.is_empty() {
            return Ok(0);
        }

        let candidates = reminders.len();
        let created = self.notifications.insert_reminders(reminders).await?;
        debug!(
            "Deadline scan: {} candidate reminders, {} created",
            candidates, created
        );

        Ok(created)
    }
}

pub async fn start_deadline_notifier(
    notifier: DeadlineNotifier,
    interval: Duration,
) -> std::result::Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_repeated_async(interval, move |_uuid, _l| {
        let notifier = notifier.clone();

        Box::pin(async move {
            match notifier.scan(Utc::now()).await {
                Ok(0) => {}
                Ok(created) => info!("Created {} deadline reminders", created),
                Err(e) => error!("Error scanning assignment deadlines: {:?}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Deadline notifier started, scanning every {:?}", interval);
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryCatalog, InMemoryNotifications};

    fn setup() -> (DeadlineNotifier, Arc<InMemoryNotifications>, Arc<InMemoryCatalog>) {
        let notifications = Arc::new(InMemoryNotifications::default());
        let catalog = Arc::new(InMemoryCatalog::default());
        let notifier = DeadlineNotifier::new(notifications.clone(), catalog.clone());
        (notifier, notifications, catalog)
    }

    #[test]
    fn test_window_boundaries() {
        let now = Utc::now();

        assert!(!ReminderTier::SixHours.is_due(now, now));
        assert!(!ReminderTier::SixHours.is_due(now - ChronoDuration::minutes(1), now));
        assert!(ReminderTier::SixHours.is_due(now + ChronoDuration::hours(6), now));
        assert!(!ReminderTier::SixHours.is_due(
            now + ChronoDuration::hours(6) + ChronoDuration::seconds(1),
            now
        ));
        assert!(ReminderTier::OneHour.is_due(now + ChronoDuration::minutes(30), now));
        assert!(!ReminderTier::OneHour.is_due(now + ChronoDuration::minutes(61), now));
    }

    #[tokio::test]
    async fn test_six_hour_reminder_created_once() {
        let (notifier, notifications, catalog) = setup();
        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let course = catalog.add_course("Rust basics", "RUST");
        catalog.add_enrollment(user_id, course.id);
        let assignment = catalog.add_assignment(
            course.id,
            "Essay",
            Some(now + ChronoDuration::hours(5) + ChronoDuration::minutes(59)),
        );

        assert_eq!(notifier.scan(now).await.unwrap(), 1);
        assert_eq!(notifier.scan(now).await.unwrap(), 0);

        let rows = notifications.all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, user_id);
        assert_eq!(rows[0].notification_type, "assignment_deadline_6h");
        assert_eq!(rows[0].entity_type.as_deref(), Some("assignment"));
        assert_eq!(rows[0].entity_id, Some(assignment.id));
    }

    #[tokio::test]
    async fn test_inside_one_hour_gets_both_tiers() {
        let (notifier, notifications, catalog) = setup();
        let now = Utc::now();
        let course = catalog.add_course("Rust basics", "RUST");
        catalog.add_enrollment(Uuid::new_v4(), course.id);
        catalog.add_enrollment(Uuid::new_v4(), course.id);
        catalog.add_assignment(course.id, "Quiz", Some(now + ChronoDuration::minutes(45)));

        assert_eq!(notifier.scan(now).await.unwrap(), 4);

        let one_hour = notifications
            .all()
            .iter()
            .filter(|n| n.notification_type == "assignment_deadline_1h")
            .count();
        assert_eq!(one_hour, 2);
    }

    #[tokio::test]
    async fn test_later_scan_adds_one_hour_tier_only() {
        let (notifier, notifications, catalog) = setup();
        let now = Utc::now();
        let course = catalog.add_course("Rust basics", "RUST");
        catalog.add_enrollment(Uuid::new_v4(), course.id);
        catalog.add_assignment(course.id, "Essay", Some(now + ChronoDuration::hours(3)));

        assert_eq!(notifier.scan(now).await.unwrap(), 1);
        let later = now + ChronoDuration::hours(2) + ChronoDuration::minutes(30);
        assert_eq!(notifier.scan(later).await.unwrap(), 1);
        assert_eq!(notifications.all().len(), 2);
    }

    #[tokio::test]
    async fn test_past_and_distant_deadlines_are_ignored() {
        let (notifier, notifications, catalog) = setup();
        let now = Utc::now();
        let course = catalog.add_course("Rust basics", "RUST");
        catalog.add_enrollment(Uuid::new_v4(), course.id);
        catalog.add_assignment(course.id, "Due now", Some(now));
        catalog.add_assignment(course.id, "Overdue", Some(now - ChronoDuration::hours(1)));
        catalog.add_assignment(course.id, "Next week", Some(now + ChronoDuration::days(7)));
        catalog.add_assignment(course.id, "No deadline", None);

        assert_eq!(notifier.scan(now).await.unwrap(), 0);
        assert!(notifications.all().is_empty());
    }

    #[tokio::test]
    async fn test_failed_scan_writes_nothing_and_retries() {
        let (notifier, notifications, catalog) = setup();
        let now = Utc::now();
        let course = catalog.add_course("Rust basics", "RUST");
        catalog.add_enrollment(Uuid::new_v4(), course.id);
        catalog.add_enrollment(Uuid::new_v4(), course.id);
        catalog.add_assignment(course.id, "Essay", Some(now + ChronoDuration::hours(2)));

        notifications.fail_writes(true);
        assert!(notifier.scan(now).await.is_err());
        assert!(notifications.all().is_empty());

        notifications.fail_writes(false);
        assert_eq!(notifier.scan(now).await.unwrap(), 2);
    }
}
