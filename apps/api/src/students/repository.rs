use std::sync::OnceLock;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use crate::errors::AppError;
use crate::models::student::{StudentProfile, StudentRow};
use crate::pagination::PageRequest;

pub const STUDENT_ID_PREFIX: &str = "STU";

const LIST_FILTER: &str = r#"
    ($1::text IS NULL OR name ILIKE $1 OR admission_number ILIKE $1 OR student_id ILIKE $1)
    AND ($2::text IS NULL OR class_name = $2)
"#;

/// Column names of every profile field, derived from `StudentProfile`'s
/// serialized keys so the SQL and the struct cannot drift apart.
pub fn profile_columns() -> &'static str {
    static COLUMNS: OnceLock<String> = OnceLock::new();
    COLUMNS.get_or_init(|| match serde_json::to_value(StudentProfile::default()) {
        Ok(Value::Object(map)) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        _ => String::new(),
    })
}

/// `STU` + admission year + row id padded to three digits, e.g. `STU2025007`.
pub fn format_student_id(year: i32, id: i32) -> String {
    format!("{STUDENT_ID_PREFIX}{year}{id:03}")
}

pub async fn find(pool: &PgPool, id: i32) -> Result<Option<StudentRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<StudentRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE student_id = $1")
        .bind(code)
        .fetch_optional(pool)
        .await
}

pub async fn exists(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM students WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn list(
    pool: &PgPool,
    search: Option<&str>,
    class_name: Option<&str>,
    page: PageRequest,
) -> Result<(Vec<StudentRow>, i64), sqlx::Error> {
    let pattern = search.map(crate::db::contains_pattern);

    let rows = sqlx::query_as::<_, StudentRow>(&format!(
        "SELECT * FROM students WHERE {LIST_FILTER} ORDER BY id LIMIT $3 OFFSET $4"
    ))
    .bind(pattern.as_deref())
    .bind(class_name)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM students WHERE {LIST_FILTER}"))
        .bind(pattern.as_deref())
        .bind(class_name)
        .fetch_one(pool)
        .await?;

    Ok((rows, total))
}

async fn ensure_admission_number_free(
    tx: &mut Transaction<'_, Postgres>,
    profile: &StudentProfile,
    except_id: Option<i32>,
) -> Result<(), AppError> {
    let Some(number) = profile.admission_number() else {
        return Ok(());
    };
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM students WHERE btrim(admission_number) = $1 AND ($2::int IS NULL OR id <> $2))",
    )
    .bind(number)
    .bind(except_id)
    .fetch_one(&mut **tx)
    .await?;
    if taken {
        return Err(AppError::Validation(
            "Student with this admission number already exists".to_string(),
        ));
    }
    Ok(())
}

/// Inserts a student and assigns its `student_id` from the reserved row id.
pub async fn insert(
    pool: &PgPool,
    profile: &StudentProfile,
    today: NaiveDate,
) -> Result<StudentRow, AppError> {
    let mut profile = profile.clone();
    profile.normalize();
    let mut tx = pool.begin().await?;

    // 1. Admission numbers are unique across students
    ensure_admission_number_free(&mut tx, &profile, None).await?;

    // 2. Reserve the row id so the public id can be derived from it
    let next_id: i64 = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('students', 'id'))")
        .fetch_one(&mut *tx)
        .await?;
    let id = i32::try_from(next_id).context("students id sequence exceeded i32")?;
    let student_id = format_student_id(today.year(), id);

    // 3. Insert every profile column from the JSON projection
    let columns = profile_columns();
    let row = sqlx::query_as::<_, StudentRow>(&format!(
        r#"
        INSERT INTO students (id, student_id, {columns}, created_at, updated_at)
        SELECT $1, $2, {columns}, $4, $4
        FROM jsonb_populate_record(NULL::students, $3)
        RETURNING *
        "#
    ))
    .bind(id)
    .bind(&student_id)
    .bind(Json(&profile))
    .bind(today)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!("Created student {student_id} (id {id})");
    Ok(row)
}

/// Applies a partial update under a row lock. `Ok(None)` when the student is gone.
pub async fn update_profile(
    pool: &PgPool,
    id: i32,
    patch: &Map<String, Value>,
    today: NaiveDate,
) -> Result<Option<StudentRow>, AppError> {
    let mut tx = pool.begin().await?;

    let Some(current) = sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
    else {
        return Ok(None);
    };

    let mut profile = current
        .profile
        .apply_patch(patch)
        .map_err(AppError::UnprocessableEntity)?;
    profile.normalize();
    profile.validate().map_err(AppError::UnprocessableEntity)?;
    if profile.admission_number() != current.profile.admission_number() {
        ensure_admission_number_free(&mut tx, &profile, Some(id)).await?;
    }

    let columns = profile_columns();
    let row = sqlx::query_as::<_, StudentRow>(&format!(
        r#"
        UPDATE students
        SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::students, $1)),
            updated_at = $2
        WHERE id = $3
        RETURNING *
        "#
    ))
    .bind(Json(&profile))
    .bind(today)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(row))
}

pub async fn update_case_record(
    pool: &PgPool,
    id: i32,
    case_record: &Map<String, Value>,
    today: NaiveDate,
) -> Result<Option<StudentRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentRow>(
        "UPDATE students SET case_record = $1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(Json(case_record))
    .bind(today)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn update_photo(
    pool: &PgPool,
    id: i32,
    photo: &[u8],
    today: NaiveDate,
) -> Result<Option<StudentRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentRow>(
        "UPDATE students SET photo = $1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(photo)
    .bind(today)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Deletes the student; therapy reports go with it via `ON DELETE CASCADE`.
pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM students WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
