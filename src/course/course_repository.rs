use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::course_models::{Assignment, Course, Group};
use crate::error::Result;

/// Read access to the platform entities notifications point at, plus the
/// enrollment write used by the self-enroll endpoint.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_course(&self, id: Uuid) -> Result<Option<Course>>;

    async fn find_assignment(&self, id: Uuid) -> Result<Option<Assignment>>;

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>>;

    /// Assignments with `after < due_date <= until`.
    async fn assignments_due_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Assignment>>;

    async fn enrolled_user_ids(&self, course_id: Uuid) -> Result<Vec<Uuid>>;

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool>;

    /// Returns false when the enrollment already existed.
    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<bool>;
}

#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn find_course(&self, id: Uuid) -> Result<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, title, enrollment_code FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    async fn find_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
        let assignment = sqlx::query_as::<_, Assignment>(
            "SELECT id, course_id, title, due_date FROM assignments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(assignment)
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>("SELECT id, name FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(group)
    }

    async fn assignments_due_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Assignment>> {
        let assignments = sqlx::query_as::<_, Assignment>(
            "SELECT id, course_id, title, due_date FROM assignments
             WHERE due_date IS NOT NULL
             AND due_date > $1
             AND due_date <= $2
             ORDER BY due_date ASC",
        )
        .bind(after)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        Ok(assignments)
    }

    async fn enrolled_user_ids(&self, course_id: Uuid) -> Result<Vec<Uuid>> {
        let user_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM enrollments WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(user_ids)
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO enrollments (user_id, course_id)
             VALUES ($1, $2)
             ON CONFLICT (user_id, course_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
