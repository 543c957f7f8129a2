/// Patient manager implementation using runtime queries
use crate::{
    account::normalize_email,
    error::{IcuError, IcuResult},
    patient::{
        Billing, CreatePatientRequest, EmergencyContact, Gender, Patient, PatientStatus,
        UpdatePatientRequest,
    },
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const PATIENT_COLUMNS: &str = "id, patient_id, name, email, phone, room_rate, additional_charges,
     insurance_provider, age, date_of_birth, gender, reason_for_admission, room_number,
     bed_number, admission_date, discharge_date, assigned_doctor, status,
     emergency_contact_name, emergency_contact_phone, emergency_contact_relation,
     medical_history, allergies, blood_type, created_by, created_at, updated_at";

/// Format a counter value as a patient id
pub fn format_patient_id(sequence: i64) -> String {
    format!("ICU{:06}", sequence)
}

/// Patient manager service
pub struct PatientManager {
    db: SqlitePool,
}

impl PatientManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Admit a new patient.
    ///
    /// The counter bump and the insert share one transaction, so concurrent
    /// admissions never receive the same `patientId`.
    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        created_by: &str,
    ) -> IcuResult<Patient> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let billing = request.billing.unwrap_or_default();
        let allergies = serde_json::to_string(&request.allergies)
            .map_err(|e| IcuError::Internal(format!("Failed to encode allergies: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let sequence: i64 = sqlx::query_scalar(
            "UPDATE counters SET value = value + 1 WHERE name = 'patient' RETURNING value",
        )
        .fetch_one(&mut *tx)
        .await?;
        let patient_id = format_patient_id(sequence);

        sqlx::query(
            "INSERT INTO patients (id, patient_id, name, email, phone, room_rate, additional_charges,
                                   insurance_provider, age, date_of_birth, gender, reason_for_admission,
                                   room_number, bed_number, admission_date, assigned_doctor, status,
                                   emergency_contact_name, emergency_contact_phone, emergency_contact_relation,
                                   medical_history, allergies, blood_type, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, 'admitted',
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?24)",
        )
        .bind(&id)
        .bind(&patient_id)
        .bind(request.name.trim())
        .bind(normalize_email(&request.email))
        .bind(request.phone.trim())
        .bind(billing.room_rate)
        .bind(billing.additional_charges)
        .bind(&billing.insurance_provider)
        .bind(request.age as i64)
        .bind(request.date_of_birth)
        .bind(request.gender.as_str())
        .bind(request.reason_for_admission.trim())
        .bind(&request.room_number)
        .bind(&request.bed_number)
        .bind(request.admission_date.unwrap_or(now))
        .bind(request.assigned_doctor.trim())
        .bind(&request.emergency_contact.name)
        .bind(&request.emergency_contact.phone)
        .bind(&request.emergency_contact.relation)
        .bind(&request.medical_history)
        .bind(&allergies)
        .bind(&request.blood_type)
        .bind(created_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Admitted patient {} ({}) by {}", patient_id, id, created_by);
        self.get_patient(&id).await
    }

    /// Get patient by record id
    pub async fn get_patient(&self, id: &str) -> IcuResult<Patient> {
        self.find_patient(id)
            .await?
            .ok_or_else(|| IcuError::NotFound("Patient not found".to_string()))
    }

    /// Look up a patient without failing on absence
    pub async fn find_patient(&self, id: &str) -> IcuResult<Option<Patient>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM patients WHERE id = ?1",
            PATIENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(patient_from_row).transpose()
    }

    /// Exact match on lowercased email and phone
    pub async fn find_by_contact(&self, email: &str, phone: &str) -> IcuResult<Option<Patient>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM patients WHERE email = ?1 AND phone = ?2
             ORDER BY created_at DESC LIMIT 1",
            PATIENT_COLUMNS
        ))
        .bind(normalize_email(email))
        .bind(phone.trim())
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(patient_from_row).transpose()
    }

    /// Whether a patient record exists
    pub async fn exists(&self, id: &str) -> IcuResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// List patients, newest first, optionally filtered by status
    pub async fn list_patients(&self, status: Option<PatientStatus>) -> IcuResult<Vec<Patient>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM patients WHERE status = ?1 ORDER BY created_at DESC, rowid DESC",
                    PATIENT_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM patients ORDER BY created_at DESC, rowid DESC",
                    PATIENT_COLUMNS
                ))
                .fetch_all(&self.db)
                .await?
            }
        };

        rows.iter().map(patient_from_row).collect()
    }

    /// Apply a partial update
    pub async fn update_patient(&self, id: &str, update: UpdatePatientRequest) -> IcuResult<Patient> {
        let current = self.get_patient(id).await?;

        let billing = update.billing.unwrap_or(current.billing);
        let contact = update.emergency_contact.unwrap_or(current.emergency_contact);
        let allergies = serde_json::to_string(&update.allergies.unwrap_or(current.allergies))
            .map_err(|e| IcuError::Internal(format!("Failed to encode allergies: {}", e)))?;

        sqlx::query(
            "UPDATE patients SET name = ?1, email = ?2, phone = ?3, room_rate = ?4,
                    additional_charges = ?5, insurance_provider = ?6, age = ?7, date_of_birth = ?8,
                    gender = ?9, reason_for_admission = ?10, room_number = ?11, bed_number = ?12,
                    admission_date = ?13, assigned_doctor = ?14, emergency_contact_name = ?15,
                    emergency_contact_phone = ?16, emergency_contact_relation = ?17,
                    medical_history = ?18, allergies = ?19, blood_type = ?20, updated_at = ?21
             WHERE id = ?22",
        )
        .bind(update.name.as_deref().map(str::trim).unwrap_or(&current.name))
        .bind(update.email.as_deref().map(normalize_email).unwrap_or(current.email))
        .bind(update.phone.as_deref().map(str::trim).unwrap_or(&current.phone))
        .bind(billing.room_rate)
        .bind(billing.additional_charges)
        .bind(&billing.insurance_provider)
        .bind(update.age.unwrap_or(current.age) as i64)
        .bind(update.date_of_birth.unwrap_or(current.date_of_birth))
        .bind(update.gender.unwrap_or(current.gender).as_str())
        .bind(update.reason_for_admission.unwrap_or(current.reason_for_admission))
        .bind(update.room_number.or(current.room_number))
        .bind(update.bed_number.or(current.bed_number))
        .bind(update.admission_date.unwrap_or(current.admission_date))
        .bind(update.assigned_doctor.unwrap_or(current.assigned_doctor))
        .bind(&contact.name)
        .bind(&contact.phone)
        .bind(&contact.relation)
        .bind(update.medical_history.unwrap_or(current.medical_history))
        .bind(&allergies)
        .bind(update.blood_type.unwrap_or(current.blood_type))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        self.get_patient(id).await
    }

    /// Mark discharged and stamp the discharge date
    pub async fn discharge_patient(&self, id: &str) -> IcuResult<Patient> {
        self.get_patient(id).await?;
        let now = Utc::now();

        sqlx::query(
            "UPDATE patients SET status = 'discharged', discharge_date = ?1, updated_at = ?1 WHERE id = ?2",
        )
        .bind(now)
        .bind(id)
        .execute(&self.db)
        .await?;

        tracing::info!("Discharged patient {}", id);
        self.get_patient(id).await
    }

    /// Undo a discharge
    pub async fn readmit_patient(&self, id: &str) -> IcuResult<Patient> {
        self.get_patient(id).await?;

        sqlx::query(
            "UPDATE patients SET status = 'admitted', discharge_date = NULL, updated_at = ?1 WHERE id = ?2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        tracing::info!("Readmitted patient {}", id);
        self.get_patient(id).await
    }

    /// Delete a patient record. Reports are left in place.
    pub async fn delete_patient(&self, id: &str) -> IcuResult<()> {
        let result = sqlx::query("DELETE FROM patients WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(IcuError::NotFound("Patient not found".to_string()));
        }

        tracing::info!("Deleted patient {}", id);
        Ok(())
    }
}

fn patient_from_row(row: &SqliteRow) -> IcuResult<Patient> {
    let gender: String = row.get("gender");
    let status: String = row.get("status");
    let allergies: String = row.get("allergies");
    let age: i64 = row.get("age");

    Ok(Patient {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        billing: Billing {
            room_rate: row.get("room_rate"),
            additional_charges: row.get("additional_charges"),
            insurance_provider: row.get("insurance_provider"),
        },
        age: age.clamp(0, 150) as u8,
        date_of_birth: row.get("date_of_birth"),
        gender: Gender::parse(&gender),
        reason_for_admission: row.get("reason_for_admission"),
        room_number: row.get("room_number"),
        bed_number: row.get("bed_number"),
        admission_date: row.get("admission_date"),
        discharge_date: row.get("discharge_date"),
        assigned_doctor: row.get("assigned_doctor"),
        status: PatientStatus::parse(&status),
        emergency_contact: EmergencyContact {
            name: row.get("emergency_contact_name"),
            phone: row.get("emergency_contact_phone"),
            relation: row.get("emergency_contact_relation"),
        },
        medical_history: row.get("medical_history"),
        allergies: serde_json::from_str(&allergies).unwrap_or_default(),
        blood_type: row.get("blood_type"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
