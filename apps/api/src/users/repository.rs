use sqlx::PgPool;
use tracing::info;

use crate::auth::password::hash_password_async;
use crate::config::AdminSeed;
use crate::errors::AppError;
use crate::models::user::{Role, UserRow};
use crate::pagination::PageRequest;

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub hashed_password: &'a str,
    pub role: Role,
}

pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn insert(pool: &PgPool, user: NewUser<'_>) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (username, email, full_name, hashed_password, role, is_active)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        RETURNING *
        "#,
    )
    .bind(user.username)
    .bind(user.email)
    .bind(user.full_name)
    .bind(user.hashed_password)
    .bind(user.role.as_str())
    .fetch_one(pool)
    .await
}

pub async fn list(
    pool: &PgPool,
    search: Option<&str>,
    page: PageRequest,
) -> Result<(Vec<UserRow>, i64), sqlx::Error> {
    let pattern = search.map(crate::db::contains_pattern);

    let rows = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT * FROM users
        WHERE ($1::text IS NULL OR username ILIKE $1 OR full_name ILIKE $1)
        ORDER BY id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(pattern.as_deref())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR username ILIKE $1 OR full_name ILIKE $1)",
    )
    .bind(pattern.as_deref())
    .fetch_one(pool)
    .await?;

    Ok((rows, total))
}

pub async fn update_password(pool: &PgPool, id: i32, hashed_password: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET hashed_password = $1 WHERE id = $2")
        .bind(hashed_password)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Creates the bootstrap admin account when the username is still free.
pub async fn seed_admin(pool: &PgPool, seed: &AdminSeed) -> Result<(), AppError> {
    if find_by_username(pool, &seed.username).await?.is_some() {
        return Ok(());
    }
    let hashed = hash_password_async(seed.password.clone()).await?;
    insert(
        pool,
        NewUser {
            username: &seed.username,
            email: None,
            full_name: Some("Administrator"),
            hashed_password: &hashed,
            role: Role::Admin,
        },
    )
    .await?;
    info!("Seeded admin account '{}'", seed.username);
    Ok(())
}
