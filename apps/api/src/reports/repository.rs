use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::therapy_report::TherapyReportRow;

pub struct NewReport<'a> {
    pub student_id: i32,
    pub teacher_id: Option<i32>,
    pub report_date: NaiveDate,
    pub therapy_type: Option<&'a str>,
    pub progress_notes: Option<&'a str>,
    pub goals_achieved: Option<&'a str>,
    pub progress_level: Option<&'a str>,
}

/// Filters applied when selecting reports for a summary. Bounds are inclusive.
#[derive(Debug, Default, Clone)]
pub struct ReportFilter<'a> {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub therapy_type: Option<&'a str>,
}

pub async fn insert(pool: &PgPool, report: NewReport<'_>) -> Result<TherapyReportRow, sqlx::Error> {
    sqlx::query_as::<_, TherapyReportRow>(
        r#"
        INSERT INTO therapy_reports
            (student_id, teacher_id, report_date, therapy_type, progress_notes, goals_achieved, progress_level)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(report.student_id)
    .bind(report.teacher_id)
    .bind(report.report_date)
    .bind(report.therapy_type)
    .bind(report.progress_notes)
    .bind(report.goals_achieved)
    .bind(report.progress_level)
    .fetch_one(pool)
    .await
}

/// Newest first.
pub async fn list_for_student(pool: &PgPool, student_id: i32) -> Result<Vec<TherapyReportRow>, sqlx::Error> {
    sqlx::query_as::<_, TherapyReportRow>(
        "SELECT * FROM therapy_reports WHERE student_id = $1 ORDER BY report_date DESC, id DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}

/// Oldest first, as the summary pipeline reads them.
pub async fn find_filtered(
    pool: &PgPool,
    student_id: i32,
    filter: &ReportFilter<'_>,
) -> Result<Vec<TherapyReportRow>, sqlx::Error> {
    sqlx::query_as::<_, TherapyReportRow>(
        r#"
        SELECT * FROM therapy_reports
        WHERE student_id = $1
          AND ($2::date IS NULL OR report_date >= $2)
          AND ($3::date IS NULL OR report_date <= $3)
          AND ($4::text IS NULL OR therapy_type = $4)
        ORDER BY report_date ASC, id ASC
        "#,
    )
    .bind(student_id)
    .bind(filter.from_date)
    .bind(filter.to_date)
    .bind(filter.therapy_type)
    .fetch_all(pool)
    .await
}
