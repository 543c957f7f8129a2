/// Patient OTP challenge flow
///
/// `NoChallenge -> Issued -> {Consumed, Expired}`. A challenge is keyed by
/// the patient's lowercased email. Requesting again overwrites the previous
/// code. A wrong code leaves the challenge in place so the patient can retry
/// until it expires; success or expiry detection removes it.

mod store;

pub use store::{MemoryOtpStore, OtpStore, RedisOtpStore};

use crate::{
    account::normalize_email,
    error::{IcuError, IcuResult},
    mailer::Mailer,
    metrics,
    patient::{Patient, PatientManager},
    token::TokenService,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Stored challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    /// Record id of the patient this code signs in
    pub patient_id: String,
}

/// OTP request body
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestOtpRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Please provide Name, Phone, and Email"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Please provide Name, Phone, and Email"))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Please provide Name, Phone, and Email"))]
    pub email: String,
}

/// OTP verification body
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Please provide Email and OTP"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Please provide Email and OTP"))]
    pub otp: String,
}

/// Result of issuing a challenge
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Random six-digit code in 100000..=999999
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Issues and verifies patient login codes
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    patients: Arc<PatientManager>,
    tokens: TokenService,
    mailer: Arc<Mailer>,
    ttl: Duration,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        patients: Arc<PatientManager>,
        tokens: TokenService,
        mailer: Arc<Mailer>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            store,
            patients,
            tokens,
            mailer,
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Issue a challenge for the patient matching all three details
    pub async fn request_challenge(
        &self,
        name: &str,
        phone: &str,
        email: &str,
    ) -> IcuResult<IssuedChallenge> {
        self.request_challenge_with(name, phone, email, generate_code(), Utc::now())
            .await
    }

    pub(crate) async fn request_challenge_with(
        &self,
        name: &str,
        phone: &str,
        email: &str,
        code: String,
        now: DateTime<Utc>,
    ) -> IcuResult<IssuedChallenge> {
        if name.trim().is_empty() || phone.trim().is_empty() || email.trim().is_empty() {
            return Err(IcuError::Validation(
                "Please provide Name, Phone, and Email".to_string(),
            ));
        }

        let email = normalize_email(email);

        // Both lookups fail the same way so callers cannot tell which field was wrong
        let patient = self
            .patients
            .find_by_contact(&email, phone)
            .await?
            .filter(|p| p.name.trim().to_lowercase() == name.trim().to_lowercase())
            .ok_or_else(|| {
                metrics::record_otp("unknown_patient");
                IcuError::NotFound("Patient not found with these details.".to_string())
            })?;

        let challenge = OtpChallenge {
            code: code.clone(),
            expires_at: now + self.ttl,
            patient_id: patient.id.clone(),
        };
        self.store.put(&email, &challenge, self.ttl).await?;

        if let Err(e) = self
            .mailer
            .send_otp(&email, &code, self.ttl.num_minutes())
            .await
        {
            tracing::warn!("Failed to deliver OTP to {}: {}", email, e);
        }

        metrics::record_otp("issued");
        tracing::info!("Issued OTP challenge for patient {}", patient.patient_id);

        Ok(IssuedChallenge {
            email,
            code,
            expires_at: challenge.expires_at,
        })
    }

    /// Consume a challenge and issue a patient token
    pub async fn verify_challenge(&self, email: &str, code: &str) -> IcuResult<(Patient, String)> {
        self.verify_challenge_at(email, code, Utc::now()).await
    }

    pub(crate) async fn verify_challenge_at(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> IcuResult<(Patient, String)> {
        if email.trim().is_empty() || code.trim().is_empty() {
            return Err(IcuError::Validation(
                "Please provide Email and OTP".to_string(),
            ));
        }

        let email = normalize_email(email);

        let challenge = self.store.get(&email).await?.ok_or_else(|| {
            metrics::record_otp("not_found");
            IcuError::NotFound("OTP expired or request not found".to_string())
        })?;

        if now > challenge.expires_at {
            self.store.remove(&email).await?;
            metrics::record_otp("expired");
            return Err(IcuError::Expired("OTP expired".to_string()));
        }

        if challenge.code != code.trim() {
            metrics::record_otp("invalid_code");
            return Err(IcuError::InvalidCode("Invalid OTP".to_string()));
        }

        self.store.remove(&email).await?;

        let patient = self.patients.get_patient(&challenge.patient_id).await?;
        let token = self.tokens.issue_patient_token(&patient.id)?;

        metrics::record_otp("verified");
        tracing::info!("Patient {} signed in with OTP", patient.patient_id);

        Ok((patient, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, patient::sample_request};

    async fn setup() -> (OtpService, Arc<MemoryOtpStore>, Patient, TokenService) {
        let pool = db::test_pool().await;
        let patients = Arc::new(PatientManager::new(pool));
        let patient = patients
            .create_patient(sample_request("jane@example.com"), "admin-1")
            .await
            .unwrap();

        let store = Arc::new(MemoryOtpStore::new());
        let tokens = TokenService::new("test-secret-key-for-testing-only-0123456789", 7);
        let service = OtpService::new(
            store.clone(),
            patients,
            tokens.clone(),
            Arc::new(Mailer::log_only()),
            300,
        );

        (service, store, patient, tokens)
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.as_bytes()[0], b'0');
        }
    }

    #[tokio::test]
    async fn test_request_and_verify() {
        let (service, store, patient, tokens) = setup().await;

        let issued = service
            .request_challenge(" jane doe ", "5550100", "Jane@Example.com")
            .await
            .unwrap();
        assert_eq!(issued.email, "jane@example.com");

        let (signed_in, token) = service
            .verify_challenge("jane@example.com", &issued.code)
            .await
            .unwrap();
        assert_eq!(signed_in.id, patient.id);

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, patient.id);
        assert_eq!(claims.role, crate::auth::Role::Patient);

        assert!(store.get("jane@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mismatched_details_are_not_found() {
        let (service, store, _patient, _tokens) = setup().await;

        assert!(matches!(
            service.request_challenge("John Doe", "5550100", "jane@example.com").await,
            Err(IcuError::NotFound(_))
        ));
        assert!(matches!(
            service.request_challenge("Jane Doe", "000", "jane@example.com").await,
            Err(IcuError::NotFound(_))
        ));
        assert!(matches!(
            service.request_challenge("", "5550100", "jane@example.com").await,
            Err(IcuError::Validation(_))
        ));
        assert!(store.get("jane@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_challenge() {
        let (service, _store, _patient, _tokens) = setup().await;
        let now = Utc::now();

        service
            .request_challenge_with("Jane Doe", "5550100", "jane@example.com", "123456".into(), now)
            .await
            .unwrap();

        assert!(matches!(
            service.verify_challenge_at("jane@example.com", "000000", now).await,
            Err(IcuError::InvalidCode(_))
        ));

        service
            .verify_challenge_at("jane@example.com", "123456", now + Duration::seconds(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_challenge_is_single_use() {
        let (service, _store, _patient, _tokens) = setup().await;
        let now = Utc::now();

        service
            .request_challenge_with("Jane Doe", "5550100", "jane@example.com", "123456".into(), now)
            .await
            .unwrap();
        service
            .verify_challenge_at("jane@example.com", "123456", now)
            .await
            .unwrap();

        assert!(matches!(
            service.verify_challenge_at("jane@example.com", "123456", now).await,
            Err(IcuError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_challenge_is_removed() {
        let (service, store, _patient, _tokens) = setup().await;
        let issued_at = Utc::now() - Duration::seconds(301);

        service
            .request_challenge_with(
                "Jane Doe",
                "5550100",
                "jane@example.com",
                "123456".into(),
                issued_at,
            )
            .await
            .unwrap();

        assert!(matches!(
            service.verify_challenge("jane@example.com", "123456").await,
            Err(IcuError::Expired(_))
        ));
        assert!(store.get("jane@example.com").await.unwrap().is_none());
        assert!(matches!(
            service.verify_challenge("jane@example.com", "123456").await,
            Err(IcuError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_new_request_invalidates_previous_code() {
        let (service, _store, _patient, _tokens) = setup().await;
        let now = Utc::now();

        service
            .request_challenge_with("Jane Doe", "5550100", "jane@example.com", "111111".into(), now)
            .await
            .unwrap();
        service
            .request_challenge_with("Jane Doe", "5550100", "jane@example.com", "222222".into(), now)
            .await
            .unwrap();

        assert!(matches!(
            service.verify_challenge_at("jane@example.com", "111111", now).await,
            Err(IcuError::InvalidCode(_))
        ));
        service
            .verify_challenge_at("jane@example.com", "222222", now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_verify_without_request() {
        let (service, _store, _patient, _tokens) = setup().await;

        assert!(matches!(
            service.verify_challenge("nobody@example.com", "123456").await,
            Err(IcuError::NotFound(_))
        ));
        assert!(matches!(
            service.verify_challenge("", "").await,
            Err(IcuError::Validation(_))
        ));
    }
}
