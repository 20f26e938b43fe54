use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::FromRow;

use super::looks_like_email;

/// Every editable column of a student record. Field names are column names.
///
/// Missing keys deserialize to `None` / `false`, so the same type serves
/// create payloads, merged partial updates and row decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct StudentProfile {
    // Core identity
    pub name: Option<String>,
    pub age: Option<i32>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub religion: Option<String>,
    pub caste: Option<String>,
    pub category: Option<String>,
    pub blood_group: Option<String>,

    // Class and admission
    pub class_name: Option<String>,
    pub roll_no: Option<String>,
    pub academic_year: Option<String>,
    pub admission_number: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub class_teacher: Option<String>,

    // Address
    pub birth_place: Option<String>,
    pub house_name: Option<String>,
    pub street_name: Option<String>,
    pub post_office: Option<String>,
    pub pin_code: Option<String>,
    pub revenue_district: Option<String>,
    pub block_panchayat: Option<String>,
    pub local_body: Option<String>,
    pub taluk: Option<String>,
    pub address_and_phone: Option<String>,

    // Contact
    pub phone_number: Option<String>,
    pub email: Option<String>,

    // Family
    pub father_name: Option<String>,
    pub father_education: Option<String>,
    pub father_occupation: Option<String>,
    pub mother_name: Option<String>,
    pub mother_education: Option<String>,
    pub mother_occupation: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_occupation: Option<String>,
    pub guardian_relationship: Option<String>,
    pub guardian_contact: Option<String>,
    pub total_family_income: Option<String>,
    /// Array of `{name, age, education, occupation, health, income}` objects.
    pub household: Option<Value>,

    // Bank
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub branch: Option<String>,
    pub ifsc_code: Option<String>,

    // Identification and medical
    pub aadhar_number: Option<String>,
    pub disability_type: Option<String>,
    pub disability_percentage: Option<f64>,
    pub identification_marks: Option<String>,
    pub specific_diagnostic: Option<String>,
    pub medical_conditions: Option<String>,
    pub is_on_regular_drugs: Option<String>,
    pub allergies: Option<String>,
    pub drug_allergy: Option<String>,
    pub food_allergy: Option<String>,
    /// Array of `{name, dose}` objects.
    pub drug_history: Option<Value>,

    // Case history
    pub informant_name: Option<String>,
    pub informant_relationship: Option<String>,
    pub duration_of_contact: Option<String>,
    pub present_complaints: Option<String>,
    pub previous_treatments: Option<String>,
    pub family_history_mental_illness: Option<String>,
    pub family_history_mental_retardation: Option<String>,
    pub family_history_epilepsy: Option<String>,
    pub prenatal_history: Option<String>,
    pub natal_history: Option<String>,
    pub postnatal_history: Option<String>,
    pub school_history: Option<String>,
    pub occupational_history: Option<String>,
    pub behaviour_problems: Option<String>,
    pub psychological_assessment: Option<String>,
    pub medical_examination: Option<String>,
    pub diagnosis: Option<String>,
    pub management_plan: Option<String>,

    // Developmental milestones
    pub smiles_at_other: bool,
    pub head_control: bool,
    pub sitting: bool,
    pub responds_to_name: bool,
    pub babbling: bool,
    pub first_words: bool,
    pub standing: bool,
    pub walking: bool,
    pub two_word_phrases: bool,
    pub toilet_control: bool,
    pub sentences: bool,
    pub physical_deformity: bool,

    // Activities of daily living
    pub eating_habits: Option<String>,
    pub drinking_habits: Option<String>,
    pub toilet_habits: Option<String>,
    pub brushing: Option<String>,
    pub bathing: Option<String>,
    pub dressing_removing_wearing: Option<String>,
    pub dressing_buttoning: Option<String>,
    pub dressing_footwear: Option<String>,
    pub dressing_grooming: Option<String>,

    // Motor, sensory, communication
    pub gross_motor: Option<String>,
    pub fine_motor: Option<String>,
    pub sensory: Option<String>,
    pub language_communication: Option<String>,
    pub social_behaviour: Option<String>,
    pub mobility_in_neighborhood: Option<String>,

    // Cognitive and functional
    pub attention: Option<String>,
    pub identification_of_objects: Option<String>,
    pub use_of_objects: Option<String>,
    pub following_instruction: Option<String>,
    pub awareness_of_danger: Option<String>,

    // Concept formation
    pub concept_color: Option<String>,
    pub concept_size: Option<String>,
    pub concept_sex: Option<String>,
    pub concept_shape: Option<String>,
    pub concept_number: Option<String>,
    pub concept_time: Option<String>,
    pub concept_money: Option<String>,

    // Academic and prevocational
    pub academic_reading: Option<String>,
    pub academic_writing: Option<String>,
    pub academic_arithmetic: Option<String>,
    pub prevocational_ability: Option<String>,
    pub prevocational_interest: Option<String>,
    pub prevocational_dislike: Option<String>,

    // Observations
    pub any_peculiar_behaviour: Option<String>,
    pub any_other: Option<String>,
    pub observations: Option<String>,
    pub recommendation: Option<String>,
}

impl StudentProfile {
    /// Field-level checks beyond what the types enforce.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            if !looks_like_email(email) {
                return Err(format!("'{email}' is not a valid email address"));
            }
        }
        if let Some(pct) = self.disability_percentage {
            if !(0.0..=100.0).contains(&pct) {
                return Err("disability_percentage must be between 0 and 100".to_string());
            }
        }
        if let Some(age) = self.age {
            if age < 0 {
                return Err("age cannot be negative".to_string());
            }
        }
        for (field, value) in [
            ("household", &self.household),
            ("drug_history", &self.drug_history),
        ] {
            match value {
                None | Some(Value::Null) => {}
                Some(Value::Array(items)) if items.iter().all(Value::is_object) => {}
                Some(_) => return Err(format!("{field} must be a list of objects")),
            }
        }
        Ok(())
    }

    /// Overlays the supplied keys on this profile. Unknown keys are ignored;
    /// known keys must carry a value of the column's type.
    pub fn apply_patch(&self, patch: &Map<String, Value>) -> Result<StudentProfile, String> {
        let mut merged = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err("student profile did not serialize to an object".to_string()),
            Err(e) => return Err(e.to_string()),
        };
        for (key, value) in patch {
            if let Some(slot) = merged.get_mut(key) {
                *slot = value.clone();
            }
        }
        serde_json::from_value(Value::Object(merged)).map_err(|e| e.to_string())
    }

    /// Stores the admission number trimmed, and blank as absent, so
    /// uniqueness is decided on the visible value.
    pub fn normalize(&mut self) {
        self.admission_number = self.admission_number().map(str::to_string);
    }

    pub fn admission_number(&self) -> Option<&str> {
        self.admission_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A PDF attached to a student, stored inline in the `documents` JSONB array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDocument {
    pub id: String,
    pub name: String,
    /// Base64 payload without a data-URL prefix.
    #[serde(default)]
    pub file_data: String,
    pub upload_date: NaiveDateTime,
    #[serde(default)]
    pub file_size: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct StudentRow {
    pub id: i32,
    pub student_id: String,
    #[sqlx(flatten)]
    pub profile: StudentProfile,
    pub photo: Option<Vec<u8>>,
    pub case_record: Option<Value>,
    pub documents: Option<Json<Vec<StudentDocument>>>,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
}

impl StudentRow {
    pub fn documents(&self) -> &[StudentDocument] {
        self.documents.as_ref().map(|d| d.0.as_slice()).unwrap_or(&[])
    }
}

/// Document metadata as exposed in listings; the payload is only served by
/// the download endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub upload_date: NaiveDateTime,
    pub file_size: i64,
}

impl From<&StudentDocument> for DocumentSummary {
    fn from(doc: &StudentDocument) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            upload_date: doc.upload_date,
            file_size: doc.file_size,
        }
    }
}

/// The one representation of a student returned by every student endpoint.
#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub id: i32,
    pub student_id: String,
    #[serde(flatten)]
    pub profile: StudentProfile,
    pub case_record: Option<Value>,
    pub photo_url: Option<String>,
    pub documents: Vec<DocumentSummary>,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
}

impl From<StudentRow> for StudentResponse {
    fn from(row: StudentRow) -> Self {
        let documents = row.documents().iter().map(DocumentSummary::from).collect();
        Self {
            id: row.id,
            student_id: row.student_id,
            photo_url: crate::media::photo_url(row.photo.as_deref()),
            profile: row.profile,
            case_record: row.case_record,
            documents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
