use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use super::looks_like_email;

/// Teachers and therapists share one record shape; only the table differs
/// (teachers also carry class assignments).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffKind {
    Teacher,
    Therapist,
}

const COMMON_COLUMNS: &[&str] = &[
    "name",
    "address",
    "date_of_birth",
    "gender",
    "blood_group",
    "mobile_number",
    "aadhar_number",
    "religion",
    "caste",
    "rci_number",
    "rci_renewal_date",
    "qualifications_details",
    "category",
    "email",
    "specialization",
];

const TEACHER_COLUMNS: &[&str] = &[
    "name",
    "address",
    "date_of_birth",
    "gender",
    "blood_group",
    "mobile_number",
    "aadhar_number",
    "religion",
    "caste",
    "rci_number",
    "rci_renewal_date",
    "qualifications_details",
    "category",
    "email",
    "specialization",
    "class_assignments",
];

impl StaffKind {
    pub fn table(self) -> &'static str {
        match self {
            StaffKind::Teacher => "teachers",
            StaffKind::Therapist => "therapists",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StaffKind::Teacher => "Teacher",
            StaffKind::Therapist => "Therapist",
        }
    }

    /// Writable columns of this kind's table.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            StaffKind::Teacher => TEACHER_COLUMNS,
            StaffKind::Therapist => COMMON_COLUMNS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct StaffDetails {
    pub name: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub mobile_number: Option<String>,
    pub aadhar_number: Option<String>,
    pub religion: Option<String>,
    pub caste: Option<String>,
    /// Rehabilitation Council of India registration.
    pub rci_number: Option<String>,
    pub rci_renewal_date: Option<NaiveDate>,
    pub qualifications_details: Option<String>,
    pub category: Option<String>,
    pub email: Option<String>,
    pub specialization: Option<String>,
    /// Teachers only.
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_assignments: Option<Value>,
}

impl StaffDetails {
    /// Every professional field except email and specialization is mandatory.
    pub fn validate(&self) -> Result<(), String> {
        let text_fields = [
            ("name", &self.name),
            ("address", &self.address),
            ("gender", &self.gender),
            ("blood_group", &self.blood_group),
            ("mobile_number", &self.mobile_number),
            ("aadhar_number", &self.aadhar_number),
            ("religion", &self.religion),
            ("caste", &self.caste),
            ("rci_number", &self.rci_number),
            ("qualifications_details", &self.qualifications_details),
            ("category", &self.category),
        ];
        for (field, value) in text_fields {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                return Err(format!("{field} is required"));
            }
        }
        if self.date_of_birth.is_none() {
            return Err("date_of_birth is required".to_string());
        }
        if self.rci_renewal_date.is_none() {
            return Err("rci_renewal_date is required".to_string());
        }
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            if !looks_like_email(email) {
                return Err(format!("'{email}' is not a valid email address"));
            }
        }
        match &self.class_assignments {
            None | Some(Value::Null) | Some(Value::Array(_)) | Some(Value::Object(_)) => Ok(()),
            Some(_) => Err("class_assignments must be a list or an object".to_string()),
        }
    }

    /// Overlays the supplied keys that are columns of `kind`'s table.
    pub fn apply_patch(&self, kind: StaffKind, patch: &Map<String, Value>) -> Result<StaffDetails, String> {
        let mut merged = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err("staff record did not serialize to an object".to_string()),
            Err(e) => return Err(e.to_string()),
        };
        for (key, value) in patch {
            if kind.columns().contains(&key.as_str()) {
                merged.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(Value::Object(merged)).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StaffRow {
    pub id: i32,
    #[sqlx(flatten)]
    pub details: StaffDetails,
    pub photo: Option<Vec<u8>>,
}

#[derive(Debug, Serialize)]
pub struct StaffResponse {
    pub id: i32,
    #[serde(flatten)]
    pub details: StaffDetails,
    pub photo_url: Option<String>,
}

impl From<StaffRow> for StaffResponse {
    fn from(row: StaffRow) -> Self {
        Self {
            id: row.id,
            photo_url: crate::media::photo_url(row.photo.as_deref()),
            details: row.details,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn complete() -> StaffDetails {
        serde_json::from_value(json!({
            "name": "Lekha",
            "address": "Kottayam",
            "date_of_birth": "1988-04-12",
            "gender": "Female",
            "blood_group": "O+",
            "mobile_number": "9876543210",
            "aadhar_number": "1234 5678 9012",
            "religion": "Hindu",
            "caste": "Nair",
            "rci_number": "RCI-4411",
            "rci_renewal_date": "2027-03-31",
            "qualifications_details": "M.Sc Speech Therapy",
            "category": "General"
        }))
        .unwrap()
    }

    #[test]
    fn test_complete_record_is_valid() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn test_blank_required_field_rejected() {
        let mut details = complete();
        details.rci_number = Some("  ".into());
        assert_eq!(details.validate().unwrap_err(), "rci_number is required");
        let mut details = complete();
        details.date_of_birth = None;
        assert_eq!(details.validate().unwrap_err(), "date_of_birth is required");
    }

    #[test]
    fn test_patch_respects_table_columns() {
        let patch = json!({"specialization": "Autism", "class_assignments": ["Class 2"]});
        let patch = patch.as_object().unwrap();

        let teacher = complete().apply_patch(StaffKind::Teacher, patch).unwrap();
        assert_eq!(teacher.specialization.as_deref(), Some("Autism"));
        assert_eq!(teacher.class_assignments, Some(json!(["Class 2"])));

        let therapist = complete().apply_patch(StaffKind::Therapist, patch).unwrap();
        assert_eq!(therapist.specialization.as_deref(), Some("Autism"));
        assert_eq!(therapist.class_assignments, None);
    }

    #[test]
    fn test_common_columns_match_struct() {
        let keys = serde_json::to_value(complete()).unwrap();
        let keys = keys.as_object().unwrap();
        for column in StaffKind::Therapist.columns() {
            assert!(keys.contains_key(*column), "{column}");
        }
        assert_eq!(StaffKind::Teacher.columns().len(), COMMON_COLUMNS.len() + 1);
    }

    #[test]
    fn test_response_omits_class_assignments_for_therapists() {
        let row = StaffRow {
            id: 3,
            details: complete(),
            photo: None,
        };
        let json = serde_json::to_value(StaffResponse::from(row)).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["name"], "Lekha");
        assert!(json.get("class_assignments").is_none());
        assert!(json["photo_url"].is_null());
    }
}
