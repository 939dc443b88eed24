use crate::{
    error::{AppError, Result},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use super::course_dto::{EnrollmentCodeRequest, EnrollmentResponse};

/// Join a course with its enrollment code
///
/// The enrollment is committed first; the `course_enrolled` event is
/// published afterwards and never affects the response.
#[utoipa::path(
    post,
    path = "/api/courses/{id}/participate",
    params(
        ("id" = Uuid, Path, description = "Course ID")
    ),
    request_body = EnrollmentCodeRequest,
    responses(
        (status = 200, description = "Enrolled or already enrolled", body = EnrollmentResponse),
        (status = 400, description = "Invalid enrollment code"),
        (status = 404, description = "Course not found"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "courses",
    security(("bearer_auth" = []))
)]
pub async fn participate_in_course(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<EnrollmentCodeRequest>,
) -> Result<Json<EnrollmentResponse>> {
    payload.validate()?;

    let course = state
        .catalog_repository
        .find_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

    if state.catalog_repository.is_enrolled(user_id, course.id).await? {
        return Ok(Json(EnrollmentResponse {
            success: true,
            message: "You are already participating in this course".to_string(),
        }));
    }

    if !course.accepts_code(&payload.enrollment_code) {
        return Err(AppError::BadRequest("Invalid enrollment code".into()));
    }

    if state.catalog_repository.enroll(user_id, course.id).await? {
        state.publisher.course_enrolled(user_id, course.id).await;
    }

    Ok(Json(EnrollmentResponse {
        success: true,
        message: "Successfully joined course".to_string(),
    }))
}
