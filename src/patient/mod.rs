/// Patient records
///
/// Patients never hold passwords. They sign in to the portal through the
/// OTP flow and see only their own record.

mod manager;

pub use manager::PatientManager;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "male" => Gender::Male,
            "female" => Gender::Female,
            _ => Gender::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Admitted,
    Discharged,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Admitted => "admitted",
            PatientStatus::Discharged => "discharged",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "discharged" => PatientStatus::Discharged,
            _ => PatientStatus::Admitted,
        }
    }
}

const BLOOD_TYPES: [&str; 9] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-", ""];

fn validate_blood_type(value: &str) -> Result<(), validator::ValidationError> {
    if BLOOD_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("blood_type"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Billing {
    pub room_rate: f64,
    pub additional_charges: f64,
    pub insurance_provider: String,
}

impl Default for Billing {
    fn default() -> Self {
        Self {
            room_rate: 500.0,
            additional_charges: 0.0,
            insurance_provider: "None".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub relation: Option<String>,
}

/// Patient record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    /// Human-readable id, `ICU` followed by six digits
    pub patient_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub billing: Billing,
    pub age: u8,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub reason_for_admission: String,
    pub room_number: Option<String>,
    pub bed_number: Option<String>,
    pub admission_date: DateTime<Utc>,
    pub discharge_date: Option<DateTime<Utc>>,
    pub assigned_doctor: String,
    pub status: PatientStatus,
    pub emergency_contact: EmergencyContact,
    pub medical_history: String,
    pub allergies: Vec<String>,
    pub blood_type: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subset of the record shown after a portal login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: String,
    pub patient_id: String,
    pub name: String,
    pub email: String,
    pub role: crate::auth::Role,
}

impl From<&Patient> for PatientSummary {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id.clone(),
            patient_id: patient.patient_id.clone(),
            name: patient.name.clone(),
            email: patient.email.clone(),
            role: crate::auth::Role::Patient,
        }
    }
}

/// Admission request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    #[validate(length(min = 1, message = "Patient name is required"))]
    pub name: String,
    #[validate(email(message = "Email is required for patient portal access"))]
    pub email: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[serde(default)]
    pub billing: Option<Billing>,
    #[validate(range(max = 150, message = "Age must be between 0 and 150"))]
    pub age: u8,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[validate(length(min = 1, message = "Reason for admission is required"))]
    pub reason_for_admission: String,
    pub room_number: Option<String>,
    pub bed_number: Option<String>,
    pub admission_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "Assigned doctor is required"))]
    pub assigned_doctor: String,
    #[serde(default)]
    pub emergency_contact: EmergencyContact,
    #[serde(default)]
    pub medical_history: String,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_blood_type", message = "Invalid blood type"))]
    pub blood_type: String,
}

/// Partial update. `patientId` and `createdBy` cannot be changed.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub billing: Option<Billing>,
    #[validate(range(max = 150, message = "Age must be between 0 and 150"))]
    pub age: Option<u8>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub reason_for_admission: Option<String>,
    pub room_number: Option<String>,
    pub bed_number: Option<String>,
    pub admission_date: Option<DateTime<Utc>>,
    pub assigned_doctor: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub medical_history: Option<String>,
    pub allergies: Option<Vec<String>>,
    #[validate(custom(function = "validate_blood_type", message = "Invalid blood type"))]
    pub blood_type: Option<String>,
}

/// Patient list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientListQuery {
    pub status: Option<PatientStatus>,
}

#[cfg(test)]
pub(crate) fn sample_request(email: &str) -> CreatePatientRequest {
    CreatePatientRequest {
        name: "Jane Doe".to_string(),
        email: email.to_string(),
        phone: "5550100".to_string(),
        billing: None,
        age: 42,
        date_of_birth: NaiveDate::from_ymd_opt(1983, 4, 2).unwrap(),
        gender: Gender::Female,
        reason_for_admission: "Observation".to_string(),
        room_number: Some("12".to_string()),
        bed_number: None,
        admission_date: None,
        assigned_doctor: "Dr. House".to_string(),
        emergency_contact: EmergencyContact::default(),
        medical_history: String::new(),
        allergies: vec!["penicillin".to_string()],
        blood_type: "O+".to_string(),
    }
}
