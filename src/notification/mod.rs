// Declare submodules
pub mod deadline_service;
pub mod notification_dto;
pub mod notification_handlers;
pub mod notification_materializer;
pub mod notification_models;
pub mod notification_repository;
pub mod routes;

// Re-export public items
pub use deadline_service::{start_deadline_notifier, DeadlineNotifier, ReminderTier};
pub use notification_materializer::NotificationMaterializer;
pub use notification_models::{NewNotification, Notification};
pub use notification_repository::{NotificationRepository, PgNotificationRepository};
