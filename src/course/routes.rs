use axum::{routing::post, Router};

use super::course_handlers::participate_in_course;
use crate::state::AppState;

pub fn course_routes() -> Router<AppState> {
    Router::new().route("/:id/participate", post(participate_in_course))
}
