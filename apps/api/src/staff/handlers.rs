use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::media::read_file_field;
use crate::models::staff::{StaffDetails, StaffKind, StaffResponse};
use crate::models::user::MANAGEMENT_ROLES;
use crate::pagination::{ListQuery, Page};
use crate::state::AppState;
use crate::staff::repository;

fn not_found(kind: StaffKind) -> AppError {
    AppError::NotFound(format!("{} not found", kind.label()))
}

/// GET /api/v1/{teachers,therapists}
pub async fn handle_list_staff(
    State(state): State<AppState>,
    Extension(kind): Extension<StaffKind>,
    _user: CurrentUser,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<Page<StaffResponse>>, AppError> {
    let page = query.page_request()?;
    let (rows, total) = repository::list(&state.db, kind, query.search_term(), page).await?;
    Ok(Json(Page::new(rows, total, page).map(StaffResponse::from)))
}

/// POST /api/v1/{teachers,therapists}
pub async fn handle_create_staff(
    State(state): State<AppState>,
    Extension(kind): Extension<StaffKind>,
    user: CurrentUser,
    AppJson(details): AppJson<StaffDetails>,
) -> Result<(StatusCode, Json<StaffResponse>), AppError> {
    user.require_role(MANAGEMENT_ROLES)?;
    details.validate().map_err(AppError::UnprocessableEntity)?;
    if kind == StaffKind::Therapist && details.class_assignments.is_some() {
        return Err(AppError::UnprocessableEntity(
            "class_assignments only applies to teachers".to_string(),
        ));
    }
    let row = repository::insert(&state.db, kind, &details).await?;
    info!("User {} created {} {}", user.id(), kind.table(), row.id);
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// GET /api/v1/{teachers,therapists}/:id
pub async fn handle_get_staff(
    State(state): State<AppState>,
    Extension(kind): Extension<StaffKind>,
    _user: CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Json<StaffResponse>, AppError> {
    let row = repository::find(&state.db, kind, id)
        .await?
        .ok_or_else(|| not_found(kind))?;
    Ok(Json(row.into()))
}

/// PUT /api/v1/{teachers,therapists}/:id
pub async fn handle_update_staff(
    State(state): State<AppState>,
    Extension(kind): Extension<StaffKind>,
    user: CurrentUser,
    AppPath(id): AppPath<i32>,
    AppJson(patch): AppJson<Map<String, Value>>,
) -> Result<Json<StaffResponse>, AppError> {
    let row = repository::update(&state.db, kind, id, &patch)
        .await?
        .ok_or_else(|| not_found(kind))?;
    info!("User {} updated {} {id}", user.id(), kind.table());
    Ok(Json(row.into()))
}

/// DELETE /api/v1/{teachers,therapists}/:id
pub async fn handle_delete_staff(
    State(state): State<AppState>,
    Extension(kind): Extension<StaffKind>,
    user: CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Json<Value>, AppError> {
    user.require_role(MANAGEMENT_ROLES)?;
    if !repository::delete(&state.db, kind, id).await? {
        return Err(not_found(kind));
    }
    info!("User {} deleted {} {id}", user.id(), kind.table());
    Ok(Json(json!({ "message": format!("{} deleted successfully", kind.label()) })))
}

/// POST /api/v1/{teachers,therapists}/:id/photo
pub async fn handle_upload_staff_photo(
    State(state): State<AppState>,
    Extension(kind): Extension<StaffKind>,
    user: CurrentUser,
    AppPath(id): AppPath<i32>,
    mut multipart: Multipart,
) -> Result<Json<StaffResponse>, AppError> {
    let upload = read_file_field(&mut multipart).await?;
    upload.ensure_image()?;
    let row = repository::update_photo(&state.db, kind, id, &upload.data)
        .await?
        .ok_or_else(|| not_found(kind))?;
    info!("User {} uploaded a photo for {} {id}", user.id(), kind.table());
    Ok(Json(row.into()))
}
