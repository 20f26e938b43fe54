use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::extract::{AppJson, AppPath};
use crate::models::therapy_report::{CreateReportRequest, TherapyReportRow};
use crate::pagination::normalize_filter;
use crate::reports::repository::{self, NewReport};
use crate::state::AppState;
use crate::students::repository as students_repo;
use crate::users::repository as users_repo;

/// POST /api/v1/therapy-reports
pub async fn handle_create_report(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<CreateReportRequest>,
) -> Result<(StatusCode, Json<TherapyReportRow>), AppError> {
    if !students_repo::exists(&state.db, req.student_id).await? {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    // Reports are attributed to the caller unless another author is named
    let teacher_id = match req.teacher_id {
        Some(id) => {
            if users_repo::find_by_id(&state.db, id).await?.is_none() {
                return Err(AppError::NotFound("Teacher not found".to_string()));
            }
            id
        }
        None => user.id(),
    };

    let goals = req.goals_text();
    let report = repository::insert(
        &state.db,
        NewReport {
            student_id: req.student_id,
            teacher_id: Some(teacher_id),
            report_date: req.report_date,
            therapy_type: normalize_filter(req.therapy_type.as_deref()),
            progress_notes: req.progress_notes.as_deref(),
            goals_achieved: goals.as_deref(),
            progress_level: normalize_filter(req.progress_level.as_deref()),
        },
    )
    .await?;

    info!(
        "User {} filed report {} for student {} ({})",
        user.id(),
        report.id,
        report.student_id,
        report.report_date
    );
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/v1/therapy-reports/student/:student_id
pub async fn handle_list_student_reports(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(student_id): AppPath<i32>,
) -> Result<Json<Vec<TherapyReportRow>>, AppError> {
    let reports = repository::list_for_student(&state.db, student_id).await?;
    Ok(Json(reports))
}
