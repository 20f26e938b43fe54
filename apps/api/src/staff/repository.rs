use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::UNIQUE_VIOLATION;
use crate::errors::AppError;
use crate::models::staff::{StaffDetails, StaffKind, StaffRow};
use crate::pagination::PageRequest;

const SEARCH_FILTER: &str = r#"
    ($1::text IS NULL
     OR name ILIKE $1
     OR mobile_number ILIKE $1
     OR qualifications_details ILIKE $1
     OR specialization ILIKE $1)
"#;

/// Aadhar and RCI numbers are unique per table; report clashes as a 400
/// naming the record kind.
fn map_duplicate(kind: StaffKind, err: sqlx::Error) -> AppError {
    let duplicate = err
        .as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if duplicate {
        AppError::Validation(format!(
            "{} with this Aadhar number or RCI number already exists",
            kind.label()
        ))
    } else {
        AppError::Database(err)
    }
}

pub async fn find(pool: &PgPool, kind: StaffKind, id: i32) -> Result<Option<StaffRow>, sqlx::Error> {
    sqlx::query_as::<_, StaffRow>(&format!("SELECT * FROM {} WHERE id = $1", kind.table()))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &PgPool,
    kind: StaffKind,
    search: Option<&str>,
    page: PageRequest,
) -> Result<(Vec<StaffRow>, i64), sqlx::Error> {
    let table = kind.table();
    let pattern = search.map(crate::db::contains_pattern);

    let rows = sqlx::query_as::<_, StaffRow>(&format!(
        "SELECT * FROM {table} WHERE {SEARCH_FILTER} ORDER BY id LIMIT $2 OFFSET $3"
    ))
    .bind(pattern.as_deref())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE {SEARCH_FILTER}"))
        .bind(pattern.as_deref())
        .fetch_one(pool)
        .await?;

    Ok((rows, total))
}

pub async fn insert(pool: &PgPool, kind: StaffKind, details: &StaffDetails) -> Result<StaffRow, AppError> {
    let table = kind.table();
    let columns = kind.columns().join(", ");
    sqlx::query_as::<_, StaffRow>(&format!(
        r#"
        INSERT INTO {table} ({columns})
        SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)
        RETURNING *
        "#
    ))
    .bind(Json(details))
    .fetch_one(pool)
    .await
    .map_err(|e| map_duplicate(kind, e))
}

/// Partial update under a row lock. `Ok(None)` when the record does not exist.
pub async fn update(
    pool: &PgPool,
    kind: StaffKind,
    id: i32,
    patch: &Map<String, Value>,
) -> Result<Option<StaffRow>, AppError> {
    let table = kind.table();
    let mut tx = pool.begin().await?;

    let Some(current) = sqlx::query_as::<_, StaffRow>(&format!("SELECT * FROM {table} WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
    else {
        return Ok(None);
    };

    let details = current
        .details
        .apply_patch(kind, patch)
        .map_err(AppError::UnprocessableEntity)?;
    details.validate().map_err(AppError::UnprocessableEntity)?;

    let columns = kind.columns().join(", ");
    let row = sqlx::query_as::<_, StaffRow>(&format!(
        r#"
        UPDATE {table}
        SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1))
        WHERE id = $2
        RETURNING *
        "#
    ))
    .bind(Json(&details))
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_duplicate(kind, e))?;

    tx.commit().await?;
    Ok(Some(row))
}

pub async fn update_photo(
    pool: &PgPool,
    kind: StaffKind,
    id: i32,
    photo: &[u8],
) -> Result<Option<StaffRow>, sqlx::Error> {
    sqlx::query_as::<_, StaffRow>(&format!(
        "UPDATE {} SET photo = $1 WHERE id = $2 RETURNING *",
        kind.table()
    ))
    .bind(photo)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, kind: StaffKind, id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
