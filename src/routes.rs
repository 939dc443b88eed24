use crate::{
    course::{course_dto::*, course_handlers, routes::course_routes},
    middleware::auth_middleware,
    notification::{
        notification_dto::*, notification_handlers, routes::notification_routes, Notification,
    },
    state::AppState,
};
use axum::{middleware, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        notification_handlers::get_notifications,
        notification_handlers::get_unread_count,
        notification_handlers::mark_notification_read,
        notification_handlers::mark_all_notifications_read,
        notification_handlers::clear_notifications,
        course_handlers::participate_in_course,
    ),
    components(
        schemas(
            Notification,
            NotificationListResponse,
            UnreadCountResponse,
            SuccessResponse,
            EnrollmentCodeRequest,
            EnrollmentResponse,
        )
    ),
    tags(
        (name = "notifications", description = "Notification feed endpoints"),
        (name = "courses", description = "Course enrollment endpoints")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Protected routes (auth required)
    let api_routes = Router::new()
        .nest("/notifications", notification_routes())
        .nest("/courses", course_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
