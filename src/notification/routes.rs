use axum::{
    routing::{get, post},
    Router,
};

use super::notification_handlers::{
    clear_notifications, get_notifications, get_unread_count, mark_all_notifications_read,
    mark_notification_read,
};
use crate::state::AppState;

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_notifications))
        .route("/unread-count", get(get_unread_count))
        .route("/read-all", post(mark_all_notifications_read))
        .route("/clear", post(clear_notifications))
        .route("/:id/read", post(mark_notification_read))
}
