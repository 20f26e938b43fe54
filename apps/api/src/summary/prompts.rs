// Prompt templates for the therapy summary pipeline. Placeholders in braces
// are substituted by `build_prompts`.

use crate::models::therapy_report::TherapyReportRow;
use crate::summary::analysis::{thirds, DateRange, ImprovementMetrics};

/// Per-section budget for report text.
pub const SECTION_CHAR_BUDGET: usize = 3_000;
/// Budget for the full-summary prompt's report text.
pub const FULL_SUMMARY_CHAR_BUDGET: usize = 12_000;

const REPORT_SEPARATOR: &str = "\n\n---\n\n";

pub const OVERVIEW_TEMPLATE: &str = "Write a brief overview of {student}'s overall therapy progress \
across {sessions} sessions from {start} to {end}. Mention the therapies involved and the general direction of progress.\n\n\
Therapy reports:\n{reports}";

pub const BASELINE_TEMPLATE: &str = "Describe {student}'s abilities and challenges at the start of therapy, \
based on the earliest sessions below. Focus on the baseline level and the main areas of difficulty.\n\n\
Early therapy reports:\n{reports}";

pub const CURRENT_STATUS_TEMPLATE: &str = "Describe {student}'s current abilities and recent achievements, \
based on the most recent sessions below. Note what has improved compared with earlier sessions.\n\n\
Recent therapy reports:\n{reports}";

pub const RECOMMENDATIONS_TEMPLATE: &str = "Suggest next steps for {student}'s therapy plan. \
Progress trend: {trend}. Session frequency: {frequency}. Consistency: {consistency}. \
Most common therapy: {therapy}. Current level: {current_level}.\n\n\
Recent therapy reports:\n{reports}";

pub const FULL_SUMMARY_TEMPLATE: &str = "Summarize the following therapy reports for {student} \
({sessions} sessions, {start} to {end}).\n\n{reports}";

#[derive(Debug, Clone)]
pub struct PromptSet {
    pub overview: String,
    pub baseline: String,
    pub current_status: String,
    pub recommendations: String,
    pub full_summary: String,
    /// Whether the full-summary report text was cut to fit its budget.
    pub truncated: bool,
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("-")
}

pub fn format_report(report: &TherapyReportRow) -> String {
    format!(
        "Date: {}\nTherapy: {}\nProgress Level: {}\nProgress Notes: {}\nGoals Achieved: {}",
        report.report_date,
        or_dash(report.therapy_type.as_deref()),
        or_dash(report.progress_level.as_deref()),
        or_dash(report.progress_notes.as_deref()),
        or_dash(report.goals_achieved.as_deref()),
    )
}

pub fn format_reports(reports: &[TherapyReportRow]) -> String {
    reports
        .iter()
        .map(format_report)
        .collect::<Vec<_>>()
        .join(REPORT_SEPARATOR)
}

fn section_text(reports: &[TherapyReportRow]) -> String {
    let text = format_reports(reports);
    truncate_chars(&text, SECTION_CHAR_BUDGET).0.to_string()
}

pub fn build_prompts(
    student_name: &str,
    reports: &[TherapyReportRow],
    metrics: &ImprovementMetrics,
    range: &DateRange,
) -> PromptSet {
    let (early, recent) = thirds(reports);
    let sessions = reports.len().to_string();
    let start = range.start_date.to_string();
    let end = range.end_date.to_string();

    let all_text = format_reports(reports);
    let (full_text, truncated) = truncate_chars(&all_text, FULL_SUMMARY_CHAR_BUDGET);
    let recent_text = section_text(recent);

    PromptSet {
        overview: OVERVIEW_TEMPLATE
            .replace("{student}", student_name)
            .replace("{sessions}", &sessions)
            .replace("{start}", &start)
            .replace("{end}", &end)
            .replace("{reports}", truncate_chars(&all_text, SECTION_CHAR_BUDGET).0),
        baseline: BASELINE_TEMPLATE
            .replace("{student}", student_name)
            .replace("{reports}", &section_text(early)),
        current_status: CURRENT_STATUS_TEMPLATE
            .replace("{student}", student_name)
            .replace("{reports}", &recent_text),
        recommendations: RECOMMENDATIONS_TEMPLATE
            .replace("{student}", student_name)
            .replace("{trend}", metrics.improvement_trend.label())
            .replace("{frequency}", &metrics.session_frequency)
            .replace("{consistency}", metrics.consistency_score.label())
            .replace("{therapy}", metrics.most_common_therapy.as_deref().unwrap_or("-"))
            .replace("{current_level}", metrics.current_level.unwrap_or("-"))
            .replace("{reports}", &recent_text),
        full_summary: FULL_SUMMARY_TEMPLATE
            .replace("{student}", student_name)
            .replace("{sessions}", &sessions)
            .replace("{start}", &start)
            .replace("{end}", &end)
            .replace("{reports}", full_text),
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::analysis::{compute_metrics, date_range, fixtures::reports};

    #[test]
    fn test_truncate_is_char_safe() {
        let text = "ശബ്ദം speech";
        let (cut, truncated) = truncate_chars(text, 3);
        assert_eq!(cut, "ശബ്");
        assert!(truncated);
        assert_eq!(truncate_chars("short", 10), ("short", false));
        assert_eq!(truncate_chars("exact", 5), ("exact", false));
    }

    #[test]
    fn test_report_block_format() {
        let rows = reports(&["Good"], "Speech Therapy", 7);
        assert_eq!(
            format_report(&rows[0]),
            "Date: 2025-01-06\nTherapy: Speech Therapy\nProgress Level: Good\n\
             Progress Notes: Session 1 notes\nGoals Achieved: Goal 1"
        );
    }

    #[test]
    fn test_reports_joined_with_separator() {
        let rows = reports(&["Good", "Average"], "OT", 7);
        assert_eq!(format_reports(&rows).matches("\n\n---\n\n").count(), 1);
    }

    #[test]
    fn test_sections_use_early_and_recent_reports() {
        let rows = reports(&["Poor", "Poor", "Average", "Good", "Excellent", "Excellent"], "OT", 7);
        let metrics = compute_metrics(&rows);
        let range = date_range(&rows).unwrap();
        let prompts = build_prompts("Anu", &rows, &metrics, &range);

        assert!(prompts.baseline.contains("Session 1 notes"));
        assert!(prompts.baseline.contains("Session 2 notes"));
        assert!(!prompts.baseline.contains("Session 6 notes"));
        assert!(prompts.current_status.contains("Session 6 notes"));
        assert!(!prompts.current_status.contains("Session 1 notes"));
        assert!(prompts.recommendations.contains("Progress trend: Improving"));
        assert!(prompts.overview.contains("6 sessions from 2025-01-06 to 2025-02-10"));
        assert!(!prompts.truncated);
        assert!(!prompts.full_summary.contains('{'));
    }

    #[test]
    fn test_full_summary_truncation_flag() {
        let mut rows = reports(&["Good"; 40], "Speech Therapy", 7);
        for row in &mut rows {
            row.progress_notes = Some("x".repeat(500));
        }
        let metrics = compute_metrics(&rows);
        let range = date_range(&rows).unwrap();
        let prompts = build_prompts("Anu", &rows, &metrics, &range);
        assert!(prompts.truncated);
        assert!(prompts.full_summary.chars().count() < FULL_SUMMARY_CHAR_BUDGET + 200);
        assert!(prompts.overview.chars().count() < SECTION_CHAR_BUDGET + 300);
    }
}
