use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai_client::{is_valid_model_name, AiProvider, Summarizer, SummaryRequest};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::extract::AppJson;
use crate::models::student::StudentRow;
use crate::models::therapy_report::TherapyReportRow;
use crate::pagination::normalize_filter;
use crate::reports::repository::{self as reports_repo, ReportFilter};
use crate::state::AppState;
use crate::students::repository as students_repo;
use crate::summary::analysis::{compute_metrics, date_range, DateRange, ImprovementMetrics};
use crate::summary::pipeline::{analyze, AnalysisInput, AnalysisSource, Lengths};
use crate::summary::prompts::build_prompts;

pub const DEFAULT_MAX_LENGTH: u32 = 280;
pub const DEFAULT_MIN_LENGTH: u32 = 60;

/// A student given either by public code (`STU2025001`) or numeric id.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StudentRef {
    Id(i64),
    Code(String),
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequestBody {
    pub student_id: StudentRef,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub therapy_type: Option<String>,
    #[serde(default)]
    pub provider: AiProvider,
    pub model: Option<String>,
    pub max_length: Option<u32>,
    pub min_length: Option<u32>,
}

impl SummaryRequestBody {
    pub fn lengths(&self) -> Result<Lengths, AppError> {
        let max_length = self.max_length.unwrap_or(DEFAULT_MAX_LENGTH);
        let min_length = self.min_length.unwrap_or(DEFAULT_MIN_LENGTH);
        if max_length == 0 {
            return Err(AppError::UnprocessableEntity(
                "max_length must be greater than 0".to_string(),
            ));
        }
        if min_length > max_length {
            return Err(AppError::UnprocessableEntity(
                "min_length cannot be greater than max_length".to_string(),
            ));
        }
        Ok(Lengths {
            max_length,
            min_length,
        })
    }

    /// The requested model override, if any.
    pub fn model(&self) -> Result<Option<&str>, AppError> {
        match normalize_filter(self.model.as_deref()) {
            Some(model) if !is_valid_model_name(model) => Err(AppError::UnprocessableEntity(
                format!("'{model}' is not a valid model name"),
            )),
            model => Ok(model),
        }
    }

    pub fn validate_dates(&self) -> Result<(), AppError> {
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if from > to {
                return Err(AppError::UnprocessableEntity(
                    "from_date cannot be after to_date".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct AiSummaryResponse {
    pub student_id: String,
    pub student_name: Option<String>,
    pub provider: AiProvider,
    pub model: String,
    pub used_reports: usize,
    pub truncated: bool,
    pub summary: String,
    pub brief_overview: String,
    pub start_date_analysis: String,
    pub end_date_analysis: String,
    pub recommendations: String,
    pub improvement_metrics: ImprovementMetrics,
    pub date_range: DateRange,
    pub analysis_source: AnalysisSource,
}

#[derive(Debug, Serialize)]
pub struct PlainSummaryResponse {
    pub student_id: String,
    pub provider: AiProvider,
    pub model: String,
    pub used_reports: usize,
    pub truncated: bool,
    pub summary: String,
}

/// Everything resolved before the first provider call.
struct Prepared {
    summarizer: Arc<dyn Summarizer>,
    model: String,
    lengths: Lengths,
    student: StudentRow,
    reports: Vec<TherapyReportRow>,
    range: DateRange,
}

async fn resolve_student(state: &AppState, student: &StudentRef) -> Result<StudentRow, AppError> {
    let found = match student {
        StudentRef::Id(id) => match i32::try_from(*id) {
            Ok(id) => students_repo::find(&state.db, id).await?,
            Err(_) => None,
        },
        StudentRef::Code(code) => {
            let code = code.trim();
            match students_repo::find_by_code(&state.db, code).await? {
                Some(row) => Some(row),
                None => match code.parse::<i32>() {
                    Ok(id) => students_repo::find(&state.db, id).await?,
                    Err(_) => None,
                },
            }
        }
    };
    found.ok_or_else(|| AppError::NotFound("Student not found".to_string()))
}

async fn prepare(state: &AppState, body: &SummaryRequestBody) -> Result<Prepared, AppError> {
    // 1. Provider first: an unconfigured provider fails before any I/O
    let summarizer = state.ai.select(body.provider)?;

    // 2. Request validation
    body.validate_dates()?;
    let lengths = body.lengths()?;
    let model = body.model()?;

    // 3. Student and filtered reports
    let student = resolve_student(state, &body.student_id).await?;
    let filter = ReportFilter {
        from_date: body.from_date,
        to_date: body.to_date,
        therapy_type: normalize_filter(body.therapy_type.as_deref()),
    };
    let reports = reports_repo::find_filtered(&state.db, student.id, &filter).await?;
    let range = date_range(&reports).ok_or_else(|| {
        AppError::NotFound("No therapy reports found for the given filters".to_string())
    })?;

    let model = model.unwrap_or(summarizer.default_model()).to_string();

    Ok(Prepared {
        summarizer,
        model,
        lengths,
        student,
        reports,
        range,
    })
}

fn display_name(student: &StudentRow) -> &str {
    normalize_filter(student.profile.name.as_deref()).unwrap_or("The student")
}

/// POST /api/v1/therapy-reports/summary/ai
pub async fn handle_ai_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(body): AppJson<SummaryRequestBody>,
) -> Result<Json<AiSummaryResponse>, AppError> {
    let prepared = prepare(&state, &body).await?;
    let name = display_name(&prepared.student);

    let metrics = compute_metrics(&prepared.reports);
    let prompts = build_prompts(name, &prepared.reports, &metrics, &prepared.range);
    let input = AnalysisInput {
        student_name: name,
        reports: &prepared.reports,
        metrics: &metrics,
        range: &prepared.range,
        prompts: &prompts,
    };
    let (sections, analysis_source) = analyze(
        prepared.summarizer.as_ref(),
        &prepared.model,
        &input,
        prepared.lengths,
    )
    .await;

    info!(
        "User {} requested analysis of student {} ({} reports, {:?})",
        user.id(),
        prepared.student.student_id,
        prepared.reports.len(),
        analysis_source
    );

    Ok(Json(AiSummaryResponse {
        student_name: prepared.student.profile.name.clone(),
        student_id: prepared.student.student_id.clone(),
        provider: body.provider,
        model: prepared.model.clone(),
        used_reports: prepared.reports.len(),
        truncated: prompts.truncated,
        summary: sections.summary,
        brief_overview: sections.brief_overview,
        start_date_analysis: sections.start_date_analysis,
        end_date_analysis: sections.end_date_analysis,
        recommendations: sections.recommendations,
        improvement_metrics: metrics,
        date_range: prepared.range,
        analysis_source,
    }))
}

/// POST /api/v1/therapy-reports/summary
///
/// Single summary of the filtered reports. Provider errors are returned to
/// the caller (429 / 502) rather than replaced by a template.
pub async fn handle_plain_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(body): AppJson<SummaryRequestBody>,
) -> Result<Json<PlainSummaryResponse>, AppError> {
    let prepared = prepare(&state, &body).await?;
    let name = display_name(&prepared.student);

    let metrics = compute_metrics(&prepared.reports);
    let prompts = build_prompts(name, &prepared.reports, &metrics, &prepared.range);
    let summary = prepared
        .summarizer
        .summarize(&SummaryRequest {
            prompt: &prompts.full_summary,
            model: &prepared.model,
            max_length: prepared.lengths.max_length,
            min_length: prepared.lengths.min_length,
        })
        .await?;

    info!(
        "User {} requested summary of student {} ({} reports)",
        user.id(),
        prepared.student.student_id,
        prepared.reports.len()
    );

    Ok(Json(PlainSummaryResponse {
        student_id: prepared.student.student_id.clone(),
        provider: body.provider,
        model: prepared.model,
        used_reports: prepared.reports.len(),
        truncated: prompts.truncated,
        summary,
    }))
}
