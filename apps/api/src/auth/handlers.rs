use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::password::{hash_password_async, verify_password_async};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::extract::{AppForm, AppJson};
use crate::models::user::Role;
use crate::state::AppState;
use crate::users::repository as users_repo;

pub const MIN_PASSWORD_LEN: usize = 8;

/// OAuth2 password-grant form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    AppForm(form): AppForm<LoginForm>,
) -> Result<Json<TokenResponse>, AppError> {
    let bad_credentials = || AppError::Unauthorized("Incorrect username or password".to_string());

    let user = users_repo::find_by_username(&state.db, form.username.trim())
        .await?
        .ok_or_else(bad_credentials)?;

    if !verify_password_async(form.password, user.hashed_password.clone()).await? {
        return Err(bad_credentials());
    }
    if !user.is_active {
        return Err(AppError::Validation("Inactive user".to_string()));
    }

    let access_token = state.tokens.issue(user.id)?;
    info!("User {} logged in", user.id);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        role: user.role(),
    }))
}

/// POST /api/v1/auth/change-password
pub async fn handle_change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<PasswordChange>,
) -> Result<Json<Value>, AppError> {
    validate_new_password(&req.new_password)?;

    if !verify_password_async(req.current_password, user.0.hashed_password.clone()).await? {
        return Err(AppError::Validation("Incorrect current password".to_string()));
    }

    let hashed = hash_password_async(req.new_password).await?;
    users_repo::update_password(&state.db, user.id(), &hashed).await?;
    info!("User {} changed their password", user.id());

    Ok(Json(json!({ "msg": "Password updated successfully" })))
}

pub fn validate_new_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::UnprocessableEntity(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
