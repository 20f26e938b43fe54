use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Ordinal progress scale recorded per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgressLevel {
    Poor,
    BelowAverage,
    Average,
    Good,
    VeryGood,
    Excellent,
}

impl ProgressLevel {
    pub const ALL: [ProgressLevel; 6] = [
        ProgressLevel::Poor,
        ProgressLevel::BelowAverage,
        ProgressLevel::Average,
        ProgressLevel::Good,
        ProgressLevel::VeryGood,
        ProgressLevel::Excellent,
    ];

    /// Case-insensitive; unknown labels are unrated (`None`).
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "poor" => Some(ProgressLevel::Poor),
            "below average" => Some(ProgressLevel::BelowAverage),
            "average" => Some(ProgressLevel::Average),
            "good" => Some(ProgressLevel::Good),
            "very good" => Some(ProgressLevel::VeryGood),
            "excellent" => Some(ProgressLevel::Excellent),
            _ => None,
        }
    }

    /// 1 (Poor) through 6 (Excellent).
    pub fn score(self) -> u8 {
        match self {
            ProgressLevel::Poor => 1,
            ProgressLevel::BelowAverage => 2,
            ProgressLevel::Average => 3,
            ProgressLevel::Good => 4,
            ProgressLevel::VeryGood => 5,
            ProgressLevel::Excellent => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProgressLevel::Poor => "Poor",
            ProgressLevel::BelowAverage => "Below Average",
            ProgressLevel::Average => "Average",
            ProgressLevel::Good => "Good",
            ProgressLevel::VeryGood => "Very Good",
            ProgressLevel::Excellent => "Excellent",
        }
    }

    /// Nearest level to a mean score, clamped to the scale.
    pub fn from_mean(mean: f64) -> Self {
        let idx = (mean.round() as i64).clamp(1, 6) as usize - 1;
        Self::ALL[idx]
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TherapyReportRow {
    pub id: i32,
    pub student_id: i32,
    pub teacher_id: Option<i32>,
    pub report_date: NaiveDate,
    pub therapy_type: Option<String>,
    pub progress_notes: Option<String>,
    pub goals_achieved: Option<String>,
    pub progress_level: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TherapyReportRow {
    pub fn level(&self) -> Option<ProgressLevel> {
        self.progress_level.as_deref().and_then(ProgressLevel::parse)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub student_id: i32,
    pub teacher_id: Option<i32>,
    pub report_date: NaiveDate,
    pub therapy_type: Option<String>,
    pub progress_notes: Option<String>,
    /// Free text, or any JSON value which is stored serialized.
    #[serde(default)]
    pub goals_achieved: Option<Value>,
    pub progress_level: Option<String>,
}

impl CreateReportRequest {
    pub fn goals_text(&self) -> Option<String> {
        match &self.goals_achieved {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}
