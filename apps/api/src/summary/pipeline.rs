use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::ai_client::{AiError, Summarizer, SummaryRequest};
use crate::models::therapy_report::TherapyReportRow;
use crate::summary::analysis::{DateRange, ImprovementMetrics};
use crate::summary::fallback::build_fallback;
use crate::summary::prompts::PromptSet;

/// The five text sections of a student analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummarySections {
    pub summary: String,
    pub brief_overview: String,
    pub start_date_analysis: String,
    pub end_date_analysis: String,
    pub recommendations: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Provider,
    Fallback,
}

/// Cap on the five provider calls together, retries included. Past it the
/// template analysis is served.
pub const ANALYSIS_DEADLINE: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy)]
pub struct Lengths {
    pub max_length: u32,
    pub min_length: u32,
}

async fn call(
    summarizer: &dyn Summarizer,
    model: &str,
    prompt: &str,
    lengths: Lengths,
) -> Result<String, AiError> {
    summarizer
        .summarize(&SummaryRequest {
            prompt,
            model,
            max_length: lengths.max_length,
            min_length: lengths.min_length,
        })
        .await
}

/// Runs the five prompts one after another; the first failure aborts.
pub async fn generate_sections(
    summarizer: &dyn Summarizer,
    model: &str,
    prompts: &PromptSet,
    lengths: Lengths,
) -> Result<SummarySections, AiError> {
    let summary = call(summarizer, model, &prompts.full_summary, lengths).await?;
    let brief_overview = call(summarizer, model, &prompts.overview, lengths).await?;
    let start_date_analysis = call(summarizer, model, &prompts.baseline, lengths).await?;
    let end_date_analysis = call(summarizer, model, &prompts.current_status, lengths).await?;
    let recommendations = call(summarizer, model, &prompts.recommendations, lengths).await?;
    Ok(SummarySections {
        summary,
        brief_overview,
        start_date_analysis,
        end_date_analysis,
        recommendations,
    })
}

/// Inputs shared by the provider and template paths.
pub struct AnalysisInput<'a> {
    pub student_name: &'a str,
    pub reports: &'a [TherapyReportRow],
    pub metrics: &'a ImprovementMetrics,
    pub range: &'a DateRange,
    pub prompts: &'a PromptSet,
}

/// Provider sections when every call succeeds within `ANALYSIS_DEADLINE`,
/// otherwise the template analysis for all five sections.
pub async fn analyze(
    summarizer: &dyn Summarizer,
    model: &str,
    input: &AnalysisInput<'_>,
    lengths: Lengths,
) -> (SummarySections, AnalysisSource) {
    let generated = timeout(
        ANALYSIS_DEADLINE,
        generate_sections(summarizer, model, input.prompts, lengths),
    )
    .await;

    let failure = match generated {
        Ok(Ok(sections)) => {
            info!(
                "Generated {} analysis with {model} from {} reports",
                summarizer.provider().as_str(),
                input.reports.len()
            );
            return (sections, AnalysisSource::Provider);
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("no result within {}s", ANALYSIS_DEADLINE.as_secs()),
    };

    warn!(
        "{} analysis failed, using template analysis: {failure}",
        summarizer.provider().as_str()
    );
    let sections = build_fallback(input.student_name, input.reports, input.metrics, input.range);
    (sections, AnalysisSource::Fallback)
}
