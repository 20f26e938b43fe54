//! Descriptive statistics over a student's therapy reports. Reports are
//! expected in chronological order.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::models::therapy_report::{ProgressLevel, TherapyReportRow};

/// Mean-score change below this magnitude counts as stable.
const TREND_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
    InsufficientData,
}

impl TrendDirection {
    pub fn label(self) -> &'static str {
        match self {
            TrendDirection::Improving => "Improving",
            TrendDirection::Stable => "Stable",
            TrendDirection::Declining => "Declining",
            TrendDirection::InsufficientData => "Insufficient data",
        }
    }
}

impl Serialize for TrendDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    High,
    Moderate,
    Irregular,
    InsufficientData,
}

impl Consistency {
    pub fn label(self) -> &'static str {
        match self {
            Consistency::High => "High consistency",
            Consistency::Moderate => "Moderate consistency",
            Consistency::Irregular => "Irregular",
            Consistency::InsufficientData => "Insufficient data",
        }
    }
}

impl Serialize for Consistency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Session counts per level, serialized in scale order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelDistribution {
    counts: [usize; 6],
    unrated: usize,
}

impl LevelDistribution {
    pub fn from_reports(reports: &[TherapyReportRow]) -> Self {
        let mut dist = Self::default();
        for report in reports {
            match report.level() {
                Some(level) => dist.counts[usize::from(level.score()) - 1] += 1,
                None => dist.unrated += 1,
            }
        }
        dist
    }

    pub fn count(&self, level: ProgressLevel) -> usize {
        self.counts[usize::from(level.score()) - 1]
    }

    pub fn unrated(&self) -> usize {
        self.unrated
    }
}

impl Serialize for LevelDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(self.unrated > 0);
        let mut map = serializer.serialize_map(Some(ProgressLevel::ALL.len() + extra))?;
        for level in ProgressLevel::ALL {
            map.serialize_entry(level.label(), &self.count(level))?;
        }
        if self.unrated > 0 {
            map.serialize_entry("Unrated", &self.unrated)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImprovementMetrics {
    pub total_sessions: usize,
    pub therapy_types_count: usize,
    pub most_common_therapy: Option<String>,
    pub session_frequency: String,
    pub consistency_score: Consistency,
    pub improvement_trend: TrendDirection,
    pub progress_levels: LevelDistribution,
    pub baseline_level: Option<&'static str>,
    pub current_level: Option<&'static str>,
    pub average_interval_days: Option<f64>,
    pub interval_std_dev_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i64,
}

/// First and last third of a sequence, where a third is `max(1, n / 3)`.
/// Both are empty for an empty slice.
pub fn thirds<T>(items: &[T]) -> (&[T], &[T]) {
    if items.is_empty() {
        return (&[], &[]);
    }
    let third = (items.len() / 3).max(1);
    (&items[..third], &items[items.len() - third..])
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn mean_score(levels: &[ProgressLevel]) -> Option<f64> {
    let scores: Vec<f64> = levels.iter().map(|l| f64::from(l.score())).collect();
    mean(&scores)
}

/// Compares the mean level of the first and last third of rated sessions.
pub fn improvement_trend(levels: &[ProgressLevel]) -> TrendDirection {
    if levels.len() < 2 {
        return TrendDirection::InsufficientData;
    }
    let (first, last) = thirds(levels);
    let (Some(start), Some(end)) = (mean_score(first), mean_score(last)) else {
        return TrendDirection::InsufficientData;
    };
    let delta = end - start;
    if delta.abs() < TREND_THRESHOLD {
        TrendDirection::Stable
    } else if delta > 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    }
}

/// Days between consecutive sessions.
pub fn session_intervals(dates: &[NaiveDate]) -> Vec<f64> {
    dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days() as f64)
        .collect()
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

pub fn consistency(session_count: usize, interval_std_dev: Option<f64>) -> Consistency {
    match interval_std_dev {
        Some(_) if session_count < 3 => Consistency::InsufficientData,
        None => Consistency::InsufficientData,
        Some(sd) if sd <= 3.0 => Consistency::High,
        Some(sd) if sd <= 7.0 => Consistency::Moderate,
        Some(_) => Consistency::Irregular,
    }
}

/// Most frequent therapy type; ties go to the type seen first.
pub fn most_common_therapy(reports: &[TherapyReportRow]) -> (Option<String>, usize) {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in reports
        .iter()
        .filter_map(|r| r.therapy_type.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        let count = counts.entry(t).or_insert(0);
        if *count == 0 {
            order.push(t);
        }
        *count += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for &t in &order {
        let c = counts[t];
        if best.map_or(true, |(_, bc)| c > bc) {
            best = Some((t, c));
        }
    }
    (best.map(|(t, _)| t.to_string()), order.len())
}

pub fn date_range(reports: &[TherapyReportRow]) -> Option<DateRange> {
    let start_date = reports.iter().map(|r| r.report_date).min()?;
    let end_date = reports.iter().map(|r| r.report_date).max()?;
    Some(DateRange {
        start_date,
        end_date,
        total_days: (end_date - start_date).num_days(),
    })
}

pub fn rated_levels(reports: &[TherapyReportRow]) -> Vec<ProgressLevel> {
    reports.iter().filter_map(TherapyReportRow::level).collect()
}

pub fn compute_metrics(reports: &[TherapyReportRow]) -> ImprovementMetrics {
    let levels = rated_levels(reports);
    let (first, last) = thirds(&levels);
    let dates: Vec<NaiveDate> = reports.iter().map(|r| r.report_date).collect();
    let intervals = session_intervals(&dates);
    let average_interval = mean(&intervals);
    let interval_sd = std_dev(&intervals);
    let (most_common, type_count) = most_common_therapy(reports);

    let session_frequency = match (reports.len(), average_interval) {
        (0, _) => "No sessions".to_string(),
        (1, _) | (_, None) => "Single session".to_string(),
        (_, Some(avg)) => format!("{avg:.1} days between sessions"),
    };

    ImprovementMetrics {
        total_sessions: reports.len(),
        therapy_types_count: type_count,
        most_common_therapy: most_common,
        session_frequency,
        consistency_score: consistency(reports.len(), interval_sd),
        improvement_trend: improvement_trend(&levels),
        progress_levels: LevelDistribution::from_reports(reports),
        baseline_level: mean_score(first).map(|m| ProgressLevel::from_mean(m).label()),
        current_level: mean_score(last).map(|m| ProgressLevel::from_mean(m).label()),
        average_interval_days: average_interval.map(round1),
        interval_std_dev_days: interval_sd.map(round1),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, NaiveDate, Utc};

    use crate::models::therapy_report::TherapyReportRow;

    /// Reports `gap_days` apart starting 2025-01-06, one per level label.
    pub fn reports(levels: &[&str], therapy_type: &str, gap_days: i64) -> Vec<TherapyReportRow> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        levels
            .iter()
            .enumerate()
            .map(|(i, level)| TherapyReportRow {
                id: i as i32 + 1,
                student_id: 1,
                teacher_id: Some(2),
                report_date: start + Duration::days(gap_days * i as i64),
                therapy_type: Some(therapy_type.to_string()),
                progress_notes: Some(format!("Session {} notes", i + 1)),
                goals_achieved: Some(format!("Goal {}", i + 1)),
                progress_level: Some(level.to_string()),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::reports;
    use super::*;

    #[test]
    fn test_increasing_levels_are_improving() {
        let rows = reports(
            &["Poor", "Below Average", "Average", "Good", "Very Good", "Excellent"],
            "Speech Therapy",
            7,
        );
        assert_eq!(improvement_trend(&rated_levels(&rows)), TrendDirection::Improving);

        let two = reports(&["Average", "Good"], "Speech Therapy", 7);
        assert_eq!(improvement_trend(&rated_levels(&two)), TrendDirection::Improving);
    }

    #[test]
    fn test_identical_levels_are_stable() {
        let rows = reports(&["Good"; 5], "Speech Therapy", 7);
        assert_eq!(improvement_trend(&rated_levels(&rows)), TrendDirection::Stable);
    }

    #[test]
    fn test_decreasing_levels_are_declining() {
        let rows = reports(&["Excellent", "Good", "Average", "Poor"], "Speech Therapy", 7);
        assert_eq!(improvement_trend(&rated_levels(&rows)), TrendDirection::Declining);
    }

    #[test]
    fn test_trend_needs_two_rated_sessions() {
        let rows = reports(&["Good", "unknown", "n/a"], "Speech Therapy", 7);
        assert_eq!(improvement_trend(&rated_levels(&rows)), TrendDirection::InsufficientData);
    }

    #[test]
    fn test_small_change_is_stable() {
        // first third [3], last third [3]; middle differences do not count
        let rows = reports(&["Average", "Excellent", "Average"], "OT", 7);
        assert_eq!(improvement_trend(&rated_levels(&rows)), TrendDirection::Stable);
    }

    #[test]
    fn test_thirds() {
        let items = [1, 2, 3, 4, 5, 6, 7];
        assert_eq!(thirds(&items), (&[1, 2][..], &[6, 7][..]));
        assert_eq!(thirds(&[1, 2]), (&[1][..], &[2][..]));
        assert_eq!(thirds::<i32>(&[]), (&[][..], &[][..]));
    }

    #[test]
    fn test_std_dev_is_population() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.0).abs() < 1e-9);
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn test_consistency_buckets() {
        assert_eq!(consistency(5, Some(0.0)), Consistency::High);
        assert_eq!(consistency(5, Some(3.0)), Consistency::High);
        assert_eq!(consistency(5, Some(6.5)), Consistency::Moderate);
        assert_eq!(consistency(5, Some(10.0)), Consistency::Irregular);
        assert_eq!(consistency(2, Some(0.0)), Consistency::InsufficientData);
        assert_eq!(consistency(1, None), Consistency::InsufficientData);
    }

    #[test]
    fn test_most_common_therapy_prefers_first_on_tie() {
        let mut rows = reports(&["Good", "Good"], "Speech Therapy", 7);
        rows.extend(reports(&["Good", "Good"], "Occupational Therapy", 7));
        let (most, count) = most_common_therapy(&rows);
        assert_eq!(most.as_deref(), Some("Speech Therapy"));
        assert_eq!(count, 2);
    }

    #[test]
    fn test_metrics_for_weekly_sessions() {
        let rows = reports(&["Poor", "Average", "Good", "Excellent"], "Speech Therapy", 7);
        let m = compute_metrics(&rows);
        assert_eq!(m.total_sessions, 4);
        assert_eq!(m.session_frequency, "7.0 days between sessions");
        assert_eq!(m.consistency_score, Consistency::High);
        assert_eq!(m.baseline_level, Some("Poor"));
        assert_eq!(m.current_level, Some("Excellent"));
        assert_eq!(m.average_interval_days, Some(7.0));
        assert_eq!(m.interval_std_dev_days, Some(0.0));

        let range = date_range(&rows).unwrap();
        assert_eq!(range.total_days, 21);
    }

    #[test]
    fn test_distribution_serializes_in_scale_order() {
        let rows = reports(&["Good", "Poor", "mystery", "Good"], "OT", 3);
        let json = serde_json::to_string(&LevelDistribution::from_reports(&rows)).unwrap();
        assert_eq!(
            json,
            r#"{"Poor":1,"Below Average":0,"Average":0,"Good":2,"Very Good":0,"Excellent":0,"Unrated":1}"#
        );
    }

    #[test]
    fn test_labels_serialize_as_text() {
        let rows = reports(&["Poor", "Good"], "OT", 7);
        let json = serde_json::to_value(compute_metrics(&rows)).unwrap();
        assert_eq!(json["improvement_trend"], "Improving");
        assert_eq!(json["consistency_score"], "Insufficient data");
    }
}
