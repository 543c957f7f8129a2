/// Vital manager implementation using runtime queries
use crate::{
    error::{IcuError, IcuResult},
    patient::PatientManager,
    vital::{CreateVitalRequest, TimeRange, UpdateVitalRequest, Vital},
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

const VITAL_COLUMNS: &str = "id, patient_id, heart_rate, blood_pressure_systolic,
     blood_pressure_diastolic, oxygen_saturation, temperature, respiratory_rate, blood_sugar,
     co2_level, notes, recorded_by, timestamp, created_at, updated_at";

/// Vital manager service
pub struct VitalManager {
    db: SqlitePool,
    patients: Arc<PatientManager>,
}

impl VitalManager {
    pub fn new(db: SqlitePool, patients: Arc<PatientManager>) -> Self {
        Self { db, patients }
    }

    async fn require_patient(&self, patient_id: &str) -> IcuResult<()> {
        if self.patients.exists(patient_id).await? {
            Ok(())
        } else {
            Err(IcuError::NotFound("Patient not found".to_string()))
        }
    }

    /// Record a reading for an existing patient
    pub async fn create_vital(
        &self,
        request: CreateVitalRequest,
        recorded_by: &str,
    ) -> IcuResult<Vital> {
        self.require_patient(&request.patient_id).await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO vitals (id, patient_id, heart_rate, blood_pressure_systolic,
                                 blood_pressure_diastolic, oxygen_saturation, temperature,
                                 respiratory_rate, blood_sugar, co2_level, notes, recorded_by,
                                 timestamp, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        )
        .bind(&id)
        .bind(&request.patient_id)
        .bind(request.heart_rate)
        .bind(request.blood_pressure_systolic)
        .bind(request.blood_pressure_diastolic)
        .bind(request.oxygen_saturation)
        .bind(request.temperature)
        .bind(request.respiratory_rate)
        .bind(request.blood_sugar)
        .bind(request.co2_level)
        .bind(&request.notes)
        .bind(recorded_by)
        .bind(request.timestamp.unwrap_or(now))
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::debug!("Recorded vitals {} for patient {}", id, request.patient_id);
        self.get_vital(&id).await
    }

    pub async fn get_vital(&self, id: &str) -> IcuResult<Vital> {
        let row = sqlx::query(&format!("SELECT {} FROM vitals WHERE id = ?1", VITAL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| IcuError::NotFound("Vital record not found".to_string()))?;

        vital_from_row(&row)
    }

    /// Readings for a patient, newest first, optionally limited to a window
    /// ending now
    pub async fn list_patient_vitals(
        &self,
        patient_id: &str,
        range: Option<TimeRange>,
    ) -> IcuResult<Vec<Vital>> {
        self.require_patient(patient_id).await?;

        let rows = match range {
            Some(range) => {
                sqlx::query(&format!(
                    "SELECT {} FROM vitals WHERE patient_id = ?1 AND timestamp >= ?2
                     ORDER BY timestamp DESC, rowid DESC",
                    VITAL_COLUMNS
                ))
                .bind(patient_id)
                .bind(Utc::now() - range.duration())
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM vitals WHERE patient_id = ?1 ORDER BY timestamp DESC, rowid DESC",
                    VITAL_COLUMNS
                ))
                .bind(patient_id)
                .fetch_all(&self.db)
                .await?
            }
        };

        rows.iter().map(vital_from_row).collect()
    }

    /// Most recent reading for a patient
    pub async fn latest_vital(&self, patient_id: &str) -> IcuResult<Vital> {
        self.require_patient(patient_id).await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM vitals WHERE patient_id = ?1 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
            VITAL_COLUMNS
        ))
        .bind(patient_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| {
            IcuError::NotFound("No vital records found for this patient".to_string())
        })?;

        vital_from_row(&row)
    }

    /// Apply a partial update
    pub async fn update_vital(&self, id: &str, update: UpdateVitalRequest) -> IcuResult<Vital> {
        let current = self.get_vital(id).await?;

        sqlx::query(
            "UPDATE vitals SET heart_rate = ?1, blood_pressure_systolic = ?2,
                    blood_pressure_diastolic = ?3, oxygen_saturation = ?4, temperature = ?5,
                    respiratory_rate = ?6, blood_sugar = ?7, co2_level = ?8, notes = ?9,
                    timestamp = ?10, updated_at = ?11
             WHERE id = ?12",
        )
        .bind(update.heart_rate.or(current.heart_rate))
        .bind(update.blood_pressure_systolic.or(current.blood_pressure_systolic))
        .bind(update.blood_pressure_diastolic.or(current.blood_pressure_diastolic))
        .bind(update.oxygen_saturation.or(current.oxygen_saturation))
        .bind(update.temperature.or(current.temperature))
        .bind(update.respiratory_rate.or(current.respiratory_rate))
        .bind(update.blood_sugar.or(current.blood_sugar))
        .bind(update.co2_level.or(current.co2_level))
        .bind(update.notes.unwrap_or(current.notes))
        .bind(update.timestamp.unwrap_or(current.timestamp))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        self.get_vital(id).await
    }

    pub async fn delete_vital(&self, id: &str) -> IcuResult<()> {
        let result = sqlx::query("DELETE FROM vitals WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(IcuError::NotFound("Vital record not found".to_string()));
        }

        tracing::info!("Deleted vital record {}", id);
        Ok(())
    }
}

fn vital_from_row(row: &SqliteRow) -> IcuResult<Vital> {
    Ok(Vital {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        heart_rate: row.get("heart_rate"),
        blood_pressure_systolic: row.get("blood_pressure_systolic"),
        blood_pressure_diastolic: row.get("blood_pressure_diastolic"),
        oxygen_saturation: row.get("oxygen_saturation"),
        temperature: row.get("temperature"),
        respiratory_rate: row.get("respiratory_rate"),
        blood_sugar: row.get("blood_sugar"),
        co2_level: row.get("co2_level"),
        notes: row.get("notes"),
        recorded_by: row.get("recorded_by"),
        timestamp: row.get("timestamp"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, patient::sample_request};
    use chrono::Duration;

    async fn setup() -> (VitalManager, String) {
        let db = db::test_pool().await;
        let patients = Arc::new(PatientManager::new(db.clone()));
        let patient = patients
            .create_patient(sample_request("jane@example.com"), "admin-1")
            .await
            .unwrap();
        (VitalManager::new(db, patients), patient.id)
    }

    fn reading(patient_id: &str, minutes_ago: i64, heart_rate: f64) -> CreateVitalRequest {
        CreateVitalRequest {
            patient_id: patient_id.to_string(),
            heart_rate: Some(heart_rate),
            timestamp: Some(Utc::now() - Duration::minutes(minutes_ago)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (manager, patient_id) = setup().await;

        let vital = manager
            .create_vital(
                CreateVitalRequest {
                    patient_id: patient_id.clone(),
                    heart_rate: Some(88.0),
                    oxygen_saturation: Some(97.0),
                    notes: "post-op".to_string(),
                    ..Default::default()
                },
                "nurse-1",
            )
            .await
            .unwrap();

        let fetched = manager.get_vital(&vital.id).await.unwrap();
        assert_eq!(fetched, vital);
        assert_eq!(fetched.heart_rate, Some(88.0));
        assert_eq!(fetched.temperature, None);
        assert_eq!(fetched.recorded_by.as_deref(), Some("nurse-1"));
    }

    #[tokio::test]
    async fn test_time_range_filter_newest_first() {
        let (manager, patient_id) = setup().await;

        let readings = [
            (30, 80.0),
            (3 * 60, 81.0),
            (2 * 24 * 60, 82.0),
            (10 * 24 * 60, 83.0),
        ];
        for (minutes_ago, heart_rate) in readings {
            manager
                .create_vital(reading(&patient_id, minutes_ago, heart_rate), "nurse-1")
                .await
                .unwrap();
        }

        let rates = |vitals: Vec<Vital>| -> Vec<f64> {
            vitals.into_iter().filter_map(|v| v.heart_rate).collect()
        };

        let hour = manager
            .list_patient_vitals(&patient_id, Some(TimeRange::LastHour))
            .await
            .unwrap();
        assert_eq!(rates(hour), vec![80.0]);

        let day = manager
            .list_patient_vitals(&patient_id, Some(TimeRange::LastDay))
            .await
            .unwrap();
        assert_eq!(rates(day), vec![80.0, 81.0]);

        let week = manager
            .list_patient_vitals(&patient_id, Some(TimeRange::LastWeek))
            .await
            .unwrap();
        assert_eq!(rates(week), vec![80.0, 81.0, 82.0]);

        let all = manager.list_patient_vitals(&patient_id, None).await.unwrap();
        assert_eq!(rates(all), vec![80.0, 81.0, 82.0, 83.0]);
    }

    #[tokio::test]
    async fn test_latest_vital() {
        let (manager, patient_id) = setup().await;

        assert!(matches!(
            manager.latest_vital(&patient_id).await,
            Err(IcuError::NotFound(_))
        ));

        manager
            .create_vital(reading(&patient_id, 120, 70.0), "nurse-1")
            .await
            .unwrap();
        manager
            .create_vital(reading(&patient_id, 5, 95.0), "nurse-1")
            .await
            .unwrap();
        manager
            .create_vital(reading(&patient_id, 60, 75.0), "nurse-1")
            .await
            .unwrap();

        let latest = manager.latest_vital(&patient_id).await.unwrap();
        assert_eq!(latest.heart_rate, Some(95.0));
    }

    #[tokio::test]
    async fn test_missing_patient() {
        let (manager, _) = setup().await;

        assert!(matches!(
            manager.create_vital(reading("ghost", 0, 70.0), "nurse-1").await,
            Err(IcuError::NotFound(_))
        ));
        assert!(matches!(
            manager.list_patient_vitals("ghost", None).await,
            Err(IcuError::NotFound(_))
        ));
        assert!(matches!(
            manager.latest_vital("ghost").await,
            Err(IcuError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (manager, patient_id) = setup().await;
        let vital = manager
            .create_vital(reading(&patient_id, 10, 70.0), "nurse-1")
            .await
            .unwrap();

        let updated = manager
            .update_vital(
                &vital.id,
                UpdateVitalRequest {
                    temperature: Some(101.2),
                    notes: Some("fever".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.heart_rate, Some(70.0));
        assert_eq!(updated.temperature, Some(101.2));
        assert_eq!(updated.notes, "fever");
        assert_eq!(updated.patient_id, patient_id);

        manager.delete_vital(&vital.id).await.unwrap();
        assert!(matches!(
            manager.get_vital(&vital.id).await,
            Err(IcuError::NotFound(_))
        ));
        assert!(matches!(
            manager.delete_vital(&vital.id).await,
            Err(IcuError::NotFound(_))
        ));
    }
}
