/// Signed session tokens
///
/// Tokens are HS256 JWTs carrying `{sub, role}`. There is no revocation list:
/// expiry is the only way a token stops working.
use crate::{
    auth::Role,
    error::{IcuError, IcuResult},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Patient tokens always live this long
pub const PATIENT_TOKEN_TTL_HOURS: i64 = 24;

/// Decoded token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User or patient record id
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    staff_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, staff_ttl_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            staff_ttl: Duration::days(staff_ttl_days),
        }
    }

    /// Token for an admin or staff user
    pub fn issue_staff_token(&self, user_id: &str, role: Role) -> IcuResult<String> {
        if role == Role::Patient {
            return Err(IcuError::Internal(
                "Patient tokens must use the patient profile".to_string(),
            ));
        }
        self.issue_at(user_id, role, Utc::now(), self.staff_ttl)
    }

    /// Token for a patient portal session
    pub fn issue_patient_token(&self, patient_id: &str) -> IcuResult<String> {
        self.issue_at(
            patient_id,
            Role::Patient,
            Utc::now(),
            Duration::hours(PATIENT_TOKEN_TTL_HOURS),
        )
    }

    pub(crate) fn issue_at(
        &self,
        subject: &str,
        role: Role,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> IcuResult<String> {
        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| IcuError::Internal(format!("Token signing failed: {}", e)))
    }

    /// Verify signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> IcuResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token verification failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        IcuError::InvalidToken("Token has expired".to_string())
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        IcuError::InvalidToken("Invalid token signature".to_string())
                    }
                    _ => IcuError::InvalidToken("Invalid or expired token".to_string()),
                }
            })
    }
}
