//! Bearer-token authentication: argon2 password hashing, HS256 JWTs and the
//! `CurrentUser` extractor every protected handler takes.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::errors::AppError;
use crate::models::user::{Role, UserRow};
use crate::state::AppState;
use crate::users::repository as users_repo;

pub mod handlers;
pub mod jwt;
pub mod password;

/// The authenticated, active user behind the request's bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

impl CurrentUser {
    pub fn id(&self) -> i32 {
        self.0.id
    }

    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.0.role()) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.tokens.verify(token)?;
        let user_id = claims.user_id()?;

        let user = users_repo::find_by_id(&state.db, user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Could not validate credentials".to_string()))?;

        if !user.is_active {
            return Err(AppError::Validation("Inactive user".to_string()));
        }

        Ok(CurrentUser(user))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let missing = || AppError::Unauthorized("Not authenticated".to_string());
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(missing)?;

    let (scheme, token) = value.split_once(' ').ok_or_else(missing)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(missing());
    }
    Ok(token.trim())
}
