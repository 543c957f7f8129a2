/// Patient vital signs
///
/// Point-in-time readings recorded by staff. Every measurement is optional;
/// a reading carries whatever the bedside monitor or nurse captured.

mod manager;

pub use manager::VitalManager;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A single set of readings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vital {
    pub id: String,
    pub patient_id: String,
    pub heart_rate: Option<f64>,
    pub blood_pressure_systolic: Option<f64>,
    pub blood_pressure_diastolic: Option<f64>,
    pub oxygen_saturation: Option<f64>,
    /// Fahrenheit
    pub temperature: Option<f64>,
    pub respiratory_rate: Option<f64>,
    pub blood_sugar: Option<f64>,
    pub co2_level: Option<f64>,
    pub notes: String,
    pub recorded_by: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New reading for an existing patient
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateVitalRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Patient id is required"))]
    pub patient_id: String,
    #[validate(range(min = 0.0, max = 300.0, message = "Heart rate must be between 0 and 300"))]
    pub heart_rate: Option<f64>,
    #[validate(range(min = 0.0, max = 300.0, message = "Systolic pressure must be between 0 and 300"))]
    pub blood_pressure_systolic: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0, message = "Diastolic pressure must be between 0 and 200"))]
    pub blood_pressure_diastolic: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "Oxygen saturation must be between 0 and 100"))]
    pub oxygen_saturation: Option<f64>,
    #[validate(range(min = 90.0, max = 110.0, message = "Temperature must be between 90 and 110"))]
    pub temperature: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "Respiratory rate must be between 0 and 100"))]
    pub respiratory_rate: Option<f64>,
    #[validate(range(min = 0.0, max = 600.0, message = "Blood sugar must be between 0 and 600"))]
    pub blood_sugar: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "CO2 level must be between 0 and 100"))]
    pub co2_level: Option<f64>,
    #[serde(default)]
    pub notes: String,
    /// When the reading was taken; defaults to now
    pub timestamp: Option<DateTime<Utc>>,
}

/// Partial update. The patient a reading belongs to cannot change.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVitalRequest {
    #[validate(range(min = 0.0, max = 300.0, message = "Heart rate must be between 0 and 300"))]
    pub heart_rate: Option<f64>,
    #[validate(range(min = 0.0, max = 300.0, message = "Systolic pressure must be between 0 and 300"))]
    pub blood_pressure_systolic: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0, message = "Diastolic pressure must be between 0 and 200"))]
    pub blood_pressure_diastolic: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "Oxygen saturation must be between 0 and 100"))]
    pub oxygen_saturation: Option<f64>,
    #[validate(range(min = 90.0, max = 110.0, message = "Temperature must be between 90 and 110"))]
    pub temperature: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "Respiratory rate must be between 0 and 100"))]
    pub respiratory_rate: Option<f64>,
    #[validate(range(min = 0.0, max = 600.0, message = "Blood sugar must be between 0 and 600"))]
    pub blood_sugar: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "CO2 level must be between 0 and 100"))]
    pub co2_level: Option<f64>,
    pub notes: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Look-back window for a patient's readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    LastHour,
    LastDay,
    LastWeek,
}

impl TimeRange {
    /// `1h`, `24h` or `7d`. Anything else means no window.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1h" => Some(TimeRange::LastHour),
            "24h" => Some(TimeRange::LastDay),
            "7d" => Some(TimeRange::LastWeek),
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            TimeRange::LastHour => Duration::hours(1),
            TimeRange::LastDay => Duration::hours(24),
            TimeRange::LastWeek => Duration::days(7),
        }
    }
}

/// Vital list filter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalListQuery {
    pub time_range: Option<String>,
}

impl VitalListQuery {
    pub fn range(&self) -> Option<TimeRange> {
        self.time_range.as_deref().and_then(TimeRange::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_parse() {
        assert_eq!(TimeRange::parse("1h"), Some(TimeRange::LastHour));
        assert_eq!(TimeRange::parse("24h"), Some(TimeRange::LastDay));
        assert_eq!(TimeRange::parse("7d"), Some(TimeRange::LastWeek));
        assert_eq!(TimeRange::parse("30d"), None);
        assert_eq!(TimeRange::parse(""), None);
        assert_eq!(TimeRange::LastWeek.duration(), Duration::days(7));
    }

    #[test]
    fn test_out_of_range_reading_is_rejected() {
        let request = CreateVitalRequest {
            patient_id: "p-1".to_string(),
            oxygen_saturation: Some(140.0),
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = CreateVitalRequest {
            patient_id: "p-1".to_string(),
            temperature: Some(98.6),
            heart_rate: Some(72.0),
            ..Default::default()
        };
        assert!(request.validate().is_ok());
    }
}
