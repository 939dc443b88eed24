use crate::{error::Result, state::AppState};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use super::notification_dto::{
    ListNotificationsQuery, NotificationListResponse, SuccessResponse, UnreadCountResponse,
    DEFAULT_LIST_LIMIT,
};

/// Get the most recent notifications for the authenticated user
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Newest notifications first", body = NotificationListResponse),
        (status = 400, description = "Invalid limit"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn get_notifications(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<NotificationListResponse>> {
    query.validate()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);

    let items = state.notification_repository.list(user_id, limit).await?;

    Ok(Json(NotificationListResponse { items }))
}

/// Count unread notifications
#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses(
        (status = 200, description = "Number of unread notifications", body = UnreadCountResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn get_unread_count(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<UnreadCountResponse>> {
    let count = state.notification_repository.unread_count(user_id).await?;

    Ok(Json(UnreadCountResponse { count }))
}

/// Mark notification as read
///
/// Unknown ids and ids owned by someone else both answer `success: false`.
#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    params(
        ("id" = String, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Whether the notification was marked", body = SuccessResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(notification_id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    let Ok(notification_id) = Uuid::parse_str(&notification_id) else {
        return Ok(Json(SuccessResponse { success: false }));
    };

    let success = state
        .notification_repository
        .mark_read(user_id, notification_id)
        .await?;

    Ok(Json(SuccessResponse { success }))
}

/// Mark every notification as read
#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "All notifications marked as read", body = SuccessResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<SuccessResponse>> {
    let updated = state.notification_repository.mark_all_read(user_id).await?;
    tracing::debug!("Marked {} notifications read for user {}", updated, user_id);

    Ok(Json(SuccessResponse { success: true }))
}

/// Delete all notifications
#[utoipa::path(
    post,
    path = "/api/notifications/clear",
    responses(
        (status = 200, description = "Notifications deleted", body = SuccessResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn clear_notifications(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<SuccessResponse>> {
    let deleted = state.notification_repository.clear(user_id).await?;
    tracing::debug!("Cleared {} notifications for user {}", deleted, user_id);

    Ok(Json(SuccessResponse { success: true }))
}
