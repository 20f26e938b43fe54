use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::auth::handlers::validate_new_password;
use crate::auth::password::hash_password_async;
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::models::user::{Role, UserResponse, MANAGEMENT_ROLES};
use crate::pagination::{ListQuery, Page};
use crate::state::AppState;
use crate::users::repository::{self, NewUser};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Role,
}

/// GET /api/v1/users/me
pub async fn handle_me(user: CurrentUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// GET /api/v1/users
pub async fn handle_list_users(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<Page<UserResponse>>, AppError> {
    user.require_role(MANAGEMENT_ROLES)?;
    let page = query.page_request()?;
    let (rows, total) = repository::list(&state.db, query.search_term(), page).await?;
    Ok(Json(Page::new(rows, total, page).map(UserResponse::from)))
}

/// GET /api/v1/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<i32>,
) -> Result<Json<UserResponse>, AppError> {
    if user.id() != id {
        user.require_role(MANAGEMENT_ROLES)?;
    }
    let row = repository::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(row.into()))
}

/// POST /api/v1/users
pub async fn handle_create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    user.require_role(&[Role::Admin])?;

    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::UnprocessableEntity("username is required".to_string()));
    }
    validate_new_password(&req.password)?;

    if repository::find_by_username(&state.db, username).await?.is_some() {
        return Err(AppError::Validation(
            "A user with this username already exists".to_string(),
        ));
    }

    let hashed = hash_password_async(req.password).await?;
    let created = repository::insert(
        &state.db,
        NewUser {
            username,
            email: req.email.as_deref(),
            full_name: req.full_name.as_deref(),
            hashed_password: &hashed,
            role: req.role,
        },
    )
    .await?;

    info!("User {} created account {} ({})", user.id(), created.id, req.role);
    Ok((StatusCode::CREATED, Json(created.into())))
}
