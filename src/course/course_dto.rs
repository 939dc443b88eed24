use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EnrollmentCodeRequest {
    #[serde(rename = "enrollmentCode")]
    #[validate(length(min = 1, message = "Enrollment code is required"))]
    pub enrollment_code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollmentResponse {
    pub success: bool,
    pub message: String,
}
