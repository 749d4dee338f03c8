use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CourseForm, CreatedCourseResponse, MessageResponse, UpdatedCourseResponse},
    repo_types::Course,
    services::{self, UploadItem},
};
use crate::{
    auth::middleware::{require_admin, require_auth},
    error::AppError,
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

// --- public routers ---

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses))
        .route("/popular", get(list_popular))
        .route("/:id", get(get_course))
}

/// Admin-only; authentication runs first, then the role check.
pub fn write_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(create_course))
        .route("/:id", put(update_course).delete(delete_course))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state, require_auth))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

// --- helpers ---

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Course"))
}

fn bad_multipart(e: MultipartError) -> AppError {
    warn!(error = %e, "multipart read failed");
    AppError::Validation("Invalid multipart body".into())
}

async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<CourseForm, AppError> {
    let mut mp = multipart.map_err(|rej| {
        warn!(error = %rej.body_text(), "multipart rejected");
        AppError::Validation("Expected a multipart/form-data body".into())
    })?;

    let mut form = CourseForm::default();
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await.map_err(bad_multipart)?;
                if !body.is_empty() {
                    form.image = Some(UploadItem {
                        file_name,
                        content_type,
                        body,
                    });
                }
            }
            "title" => form.title = Some(field.text().await.map_err(bad_multipart)?),
            "duration" => form.duration = Some(field.text().await.map_err(bad_multipart)?),
            "description" => {
                form.description = Some(field.text().await.map_err(bad_multipart)?)
            }
            "popular" => form.popular = Some(field.text().await.map_err(bad_multipart)?),
            "outline" => form.outline = Some(field.text().await.map_err(bad_multipart)?),
            other => debug!(field = %other, "ignoring multipart field"),
        }
    }
    Ok(form)
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    Ok(Json(state.courses.list(false).await?))
}

#[instrument(skip(state))]
pub async fn list_popular(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    Ok(Json(state.courses.list(true).await?))
}

#[instrument(skip(state))]
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Course>, AppError> {
    let id = parse_id(&id)?;
    state
        .courses
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Course"))
}

/// POST /api/courses (multipart: title, duration, description, popular, outline, image)
#[instrument(skip(state, multipart))]
pub async fn create_course(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<CreatedCourseResponse>), AppError> {
    let form = read_form(multipart).await?;
    let course = services::create_course(&state, form).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedCourseResponse {
            message: "Course created successfully!",
            course,
        }),
    ))
}

#[instrument(skip(state, multipart))]
pub async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UpdatedCourseResponse>, AppError> {
    let id = parse_id(&id)?;
    let form = read_form(multipart).await?;
    let updated_course = services::update_course(&state, id, form).await?;
    Ok(Json(UpdatedCourseResponse {
        message: "Course updated successfully!",
        updated_course,
    }))
}

#[instrument(skip(state))]
pub async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_course(&state, parse_id(&id)?).await?;
    Ok(Json(MessageResponse {
        message: "Course deleted successfully!",
    }))
}
