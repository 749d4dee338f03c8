use serde::Serialize;

use super::{repo_types::Course, services::UploadItem};

/// Text and file fields collected from a course multipart body.
#[derive(Default)]
pub struct CourseForm {
    pub title: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub popular: Option<String>,
    pub outline: Option<String>,
    pub image: Option<UploadItem>,
}

#[derive(Debug, Serialize)]
pub struct CreatedCourseResponse {
    pub message: &'static str,
    pub course: Course,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedCourseResponse {
    pub message: &'static str,
    pub updated_course: Course,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
