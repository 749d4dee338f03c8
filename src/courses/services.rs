use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::CourseForm,
    repo_types::{Course, CourseChanges, NewCourse, Week},
};
use crate::{error::AppError, state::AppState};

pub struct UploadItem {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Parses the multipart `outline` field. It must be a JSON array of weeks.
pub fn parse_outline(raw: &str) -> Result<Vec<Week>, AppError> {
    let invalid = |details: String| AppError::InvalidOutline {
        details,
        received: raw.to_string(),
    };
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
    if !value.is_array() {
        return Err(invalid("Outline must be an array".into()));
    }
    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
}

/// `<unix millis>-<original name>` with whitespace runs turned into `-` and
/// path separators dropped.
pub fn stored_file_name(original: &str, now: OffsetDateTime) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut cleaned = String::with_capacity(base.len());
    let mut in_space = false;
    for ch in base.chars() {
        if ch.is_whitespace() {
            if !in_space {
                cleaned.push('-');
            }
            in_space = true;
        } else {
            cleaned.push(ch);
            in_space = false;
        }
    }
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        cleaned = "image".into();
    }
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{millis}-{cleaned}")
}

async fn store_image(st: &AppState, image: UploadItem) -> Result<String, AppError> {
    let key = stored_file_name(&image.file_name, OffsetDateTime::now_utc());
    let path = st
        .storage
        .put_object(&key, image.body, &image.content_type)
        .await?;
    Ok(path)
}

async fn discard_image(st: &AppState, path: &str) {
    if path.is_empty() {
        return;
    }
    if let Err(e) = st.storage.delete_object(path).await {
        warn!(error = %e, %path, "failed to delete course image");
    }
}

pub async fn create_course(st: &AppState, form: CourseForm) -> Result<Course, AppError> {
    let outline = parse_outline(form.outline.as_deref().unwrap_or("[]"))?;
    let image = match form.image {
        Some(img) => store_image(st, img).await?,
        None => String::new(),
    };

    let inserted = st
        .courses
        .insert(NewCourse {
            image: image.clone(),
            title: form.title,
            duration: form.duration,
            description: form.description,
            popular: form.popular.as_deref() == Some("true"),
            outline,
        })
        .await;
    let course = match inserted {
        Ok(course) => course,
        Err(e) => {
            discard_image(st, &image).await;
            return Err(e.into());
        }
    };
    info!(course_id = %course.id, "course created");
    Ok(course)
}

pub async fn update_course(st: &AppState, id: Uuid, form: CourseForm) -> Result<Course, AppError> {
    let outline = match form.outline.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(parse_outline(raw)?),
        None => None,
    };

    let existing = st
        .courses
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Course"))?;

    let image = match form.image {
        Some(img) => Some(store_image(st, img).await?),
        None => None,
    };

    let changes = CourseChanges {
        image: image.clone(),
        title: form.title,
        duration: form.duration,
        description: form.description,
        popular: form.popular.map(|p| p == "true"),
        outline,
    };

    let updated = match st.courses.update(id, changes).await {
        Ok(Some(course)) => course,
        outcome => {
            if let Some(path) = &image {
                discard_image(st, path).await;
            }
            return Err(match outcome {
                Err(e) => e.into(),
                // deleted between lookup and update
                _ => AppError::NotFound("Course"),
            });
        }
    };

    if image.is_some() && existing.image != updated.image {
        discard_image(st, &existing.image).await;
    }
    info!(course_id = %id, "course updated");
    Ok(updated)
}

pub async fn delete_course(st: &AppState, id: Uuid) -> Result<(), AppError> {
    let deleted = st
        .courses
        .delete(id)
        .await?
        .ok_or(AppError::NotFound("Course"))?;
    discard_image(st, &deleted.image).await;
    info!(course_id = %id, "course deleted");
    Ok(())
}
