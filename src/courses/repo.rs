use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{Course, CourseChanges, CourseRow, NewCourse};
use crate::error::StoreError;

#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Oldest first; `popular_only` filters to popular courses.
    async fn list(&self, popular_only: bool) -> Result<Vec<Course>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>, StoreError>;
    async fn insert(&self, course: NewCourse) -> Result<Course, StoreError>;
    async fn update(&self, id: Uuid, changes: CourseChanges)
        -> Result<Option<Course>, StoreError>;
    /// Returns the deleted course, if it existed.
    async fn delete(&self, id: Uuid) -> Result<Option<Course>, StoreError>;
}

const COLUMNS: &str =
    "id, image, title, duration, description, popular, outline, created_at, updated_at";

#[derive(Clone)]
pub struct PgCourseStore {
    db: PgPool,
}

impl PgCourseStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CourseStore for PgCourseStore {
    async fn list(&self, popular_only: bool) -> Result<Vec<Course>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM courses WHERE ($1 = FALSE OR popular) ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(popular_only)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM courses WHERE id = $1");
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Course::from))
    }

    async fn insert(&self, course: NewCourse) -> Result<Course, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO courses (image, title, duration, description, popular, outline)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(&course.image)
            .bind(&course.title)
            .bind(&course.duration)
            .bind(&course.description)
            .bind(course.popular)
            .bind(Json(&course.outline))
            .fetch_one(&self.db)
            .await?;
        Ok(row.into())
    }

    async fn update(
        &self,
        id: Uuid,
        changes: CourseChanges,
    ) -> Result<Option<Course>, StoreError> {
        let sql = format!(
            r#"
            UPDATE courses SET
                image       = COALESCE($2, image),
                title       = COALESCE($3, title),
                duration    = COALESCE($4, duration),
                description = COALESCE($5, description),
                popular     = COALESCE($6, popular),
                outline     = COALESCE($7, outline),
                updated_at  = now()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(id)
            .bind(&changes.image)
            .bind(&changes.title)
            .bind(&changes.duration)
            .bind(&changes.description)
            .bind(changes.popular)
            .bind(changes.outline.as_ref().map(Json))
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Course::from))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let sql = format!("DELETE FROM courses WHERE id = $1 RETURNING {COLUMNS}");
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Course::from))
    }
}
