//! Template-based analysis used when the provider cannot produce one.
//! Built from the same statistics as the provider path.

use crate::models::therapy_report::TherapyReportRow;
use crate::summary::analysis::{thirds, DateRange, ImprovementMetrics, TrendDirection};
use crate::summary::pipeline::SummarySections;

fn trend_sentence(trend: TrendDirection) -> &'static str {
    match trend {
        TrendDirection::Improving => "Progress levels have risen over the period, indicating improvement.",
        TrendDirection::Stable => "Progress levels have remained broadly stable over the period.",
        TrendDirection::Declining => "Progress levels have fallen over the period and need attention.",
        TrendDirection::InsufficientData => {
            "There are not enough rated sessions to judge the direction of progress."
        }
    }
}

fn latest_note(reports: &[TherapyReportRow]) -> Option<&str> {
    reports
        .iter()
        .rev()
        .filter_map(|r| r.progress_notes.as_deref())
        .map(str::trim)
        .find(|n| !n.is_empty())
}

fn goals_listing(reports: &[TherapyReportRow]) -> String {
    let goals: Vec<String> = reports
        .iter()
        .filter_map(|r| {
            let goal = r.goals_achieved.as_deref()?.trim();
            (!goal.is_empty()).then(|| format!("- {}: {goal}", r.report_date))
        })
        .collect();
    if goals.is_empty() {
        "No goals were recorded for these sessions.".to_string()
    } else {
        goals.join("\n")
    }
}

pub fn build_fallback(
    student_name: &str,
    reports: &[TherapyReportRow],
    metrics: &ImprovementMetrics,
    range: &DateRange,
) -> SummarySections {
    let (early, recent) = thirds(reports);
    let therapy = metrics
        .most_common_therapy
        .as_deref()
        .unwrap_or("unspecified therapy");

    let brief_overview = format!(
        "{student_name} attended {} therapy sessions between {} and {} ({} days), \
         covering {} therapy type(s), most often {therapy}. {}",
        metrics.total_sessions,
        range.start_date,
        range.end_date,
        range.total_days,
        metrics.therapy_types_count,
        trend_sentence(metrics.improvement_trend),
    );

    let start_date_analysis = format!(
        "Baseline level: {}.\nEarly sessions ({} to {}):\n{}",
        metrics.baseline_level.unwrap_or("not rated"),
        early.first().map_or(range.start_date, |r| r.report_date),
        early.last().map_or(range.start_date, |r| r.report_date),
        goals_listing(early),
    );

    let mut end_date_analysis = format!(
        "Current level: {}.\nRecent sessions ({} to {}):\n{}",
        metrics.current_level.unwrap_or("not rated"),
        recent.first().map_or(range.end_date, |r| r.report_date),
        recent.last().map_or(range.end_date, |r| r.report_date),
        goals_listing(recent),
    );
    if let Some(note) = latest_note(recent) {
        end_date_analysis.push_str(&format!("\nLatest note: {note}"));
    }

    let mut recommendations = vec![match metrics.improvement_trend {
        TrendDirection::Improving => format!("Continue the current {therapy} plan and raise goals gradually."),
        TrendDirection::Stable => format!("Review the {therapy} goals; consider new activities to restart progress."),
        TrendDirection::Declining => format!("Schedule a case review of the {therapy} plan with the family."),
        TrendDirection::InsufficientData => "Record a progress level for every session so progress can be tracked.".to_string(),
    }];
    recommendations.push(format!(
        "Session pattern: {} ({}).",
        metrics.session_frequency,
        metrics.consistency_score.label()
    ));
    if metrics.progress_levels.unrated() > 0 {
        recommendations.push(format!(
            "{} session(s) have no recognised progress level.",
            metrics.progress_levels.unrated()
        ));
    }

    let summary = format!(
        "{brief_overview}\n\n{start_date_analysis}\n\n{end_date_analysis}"
    );

    SummarySections {
        summary,
        brief_overview,
        start_date_analysis,
        end_date_analysis,
        recommendations: recommendations.join("\n"),
    }
}
