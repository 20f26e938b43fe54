use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::media::read_file_field;
use crate::models::student::{StudentProfile, StudentResponse};
use crate::models::user::MANAGEMENT_ROLES;
use crate::pagination::{normalize_filter, Page, PageRequest};
use crate::state::AppState;
use crate::students::repository;

#[derive(Debug, Default, Deserialize)]
pub struct StudentListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
    pub class_name: Option<String>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn not_found() -> AppError {
    AppError::NotFound("Student not found".to_string())
}

/// Rules a new student must satisfy before it is written.
pub fn validate_new_student(profile: &StudentProfile) -> Result<(), AppError> {
    if profile.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        return Err(AppError::UnprocessableEntity("name is required".to_string()));
    }
    profile.validate().map_err(AppError::UnprocessableEntity)
}

/// GET /api/v1/students
pub async fn handle_list_students(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(query): AppQuery<StudentListQuery>,
) -> Result<Json<Page<StudentResponse>>, AppError> {
    let page = PageRequest::new(query.page, query.page_size)?;
    let (rows, total) = repository::list(
        &state.db,
        normalize_filter(query.search.as_deref()),
        normalize_filter(query.class_name.as_deref()),
        page,
    )
    .await?;
    Ok(Json(Page::new(rows, total, page).map(StudentResponse::from)))
}

/// POST /api/v1/students
pub async fn handle_create_student(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(profile): AppJson<StudentProfile>,
) -> Result<(StatusCode, Json<StudentResponse>), AppError> {
    validate_new_student(&profile)?;
    let row = repository::insert(&state.db, &profile, today()).await?;
    info!("User {} created student {}", user.id(), row.student_id);
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// GET /api/v1/students/:id
pub async fn handle_get_student(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Json<StudentResponse>, AppError> {
    let row = repository::find(&state.db, id).await?.ok_or_else(not_found)?;
    Ok(Json(row.into()))
}

/// PUT /api/v1/students/:id
pub async fn handle_update_student(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<i32>,
    AppJson(patch): AppJson<Map<String, Value>>,
) -> Result<Json<StudentResponse>, AppError> {
    let row = repository::update_profile(&state.db, id, &patch, today())
        .await?
        .ok_or_else(not_found)?;
    info!("User {} updated student {id} ({} fields)", user.id(), patch.len());
    Ok(Json(row.into()))
}

/// DELETE /api/v1/students/:id
pub async fn handle_delete_student(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Json<Value>, AppError> {
    user.require_role(MANAGEMENT_ROLES)?;
    if !repository::delete(&state.db, id).await? {
        return Err(not_found());
    }
    info!("User {} deleted student {id}", user.id());
    Ok(Json(json!({ "message": "Student successfully deleted" })))
}

/// PUT /api/v1/students/:id/case-record
pub async fn handle_update_case_record(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<i32>,
    AppJson(case_record): AppJson<Map<String, Value>>,
) -> Result<Json<StudentResponse>, AppError> {
    let row = repository::update_case_record(&state.db, id, &case_record, today())
        .await?
        .ok_or_else(not_found)?;
    info!("User {} saved case record for student {id}", user.id());
    Ok(Json(row.into()))
}

/// POST /api/v1/students/:id/photo
pub async fn handle_upload_photo(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<i32>,
    mut multipart: Multipart,
) -> Result<Json<StudentResponse>, AppError> {
    let upload = read_file_field(&mut multipart).await?;
    upload.ensure_image()?;
    let row = repository::update_photo(&state.db, id, &upload.data, today())
        .await?
        .ok_or_else(not_found)?;
    info!("User {} uploaded a photo for student {id} ({} bytes)", user.id(), upload.data.len());
    Ok(Json(row.into()))
}
