/// Authentication extractors and utilities
///
/// A bearer token resolves to exactly one [`Principal`]. Handlers pick the
/// extractor matching their role gate; patient self-access is checked with
/// [`Principal::ensure_patient_access`].
use crate::{
    account::User,
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::{IcuError, IcuResult},
    metrics,
    patient::Patient,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Principal role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Patient => "patient",
        }
    }
}

impl FromStr for Role {
    type Err = IcuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "patient" => Ok(Role::Patient),
            _ => Err(IcuError::Validation(format!("Unknown role: {}", s))),
        }
    }
}

/// The identity behind a verified token
#[derive(Debug, Clone)]
pub enum Principal {
    Admin(User),
    Staff(User),
    Patient(Patient),
}

impl Principal {
    pub fn role(&self) -> Role {
        match self {
            Principal::Admin(_) => Role::Admin,
            Principal::Staff(_) => Role::Staff,
            Principal::Patient(_) => Role::Patient,
        }
    }

    /// Record id of the user or patient
    pub fn id(&self) -> &str {
        match self {
            Principal::Admin(user) | Principal::Staff(user) => &user.id,
            Principal::Patient(patient) => &patient.id,
        }
    }

    /// Admin or staff account, if this is one
    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Admin(user) | Principal::Staff(user) => Some(user),
            Principal::Patient(_) => None,
        }
    }

    /// Patients may only reach their own record; admin and staff reach all
    pub fn ensure_patient_access(&self, patient_record_id: &str) -> IcuResult<()> {
        match self {
            Principal::Patient(patient) if patient.id != patient_record_id => Err(
                IcuError::Forbidden("Not authorized to access this patient's data".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// Resolve a bearer token to a principal.
///
/// Patient tokens resolve against the patient table, everything else
/// against users. A verified token whose record is gone is rejected.
pub async fn authenticate(ctx: &AppContext, token: &str) -> IcuResult<Principal> {
    let claims = ctx.token_service.verify(token)?;

    match claims.role {
        Role::Patient => {
            let patient = ctx
                .patient_manager
                .find_patient(&claims.sub)
                .await?
                .ok_or_else(|| IcuError::Unauthorized("Patient not found".to_string()))?;

            Ok(Principal::Patient(patient))
        }
        Role::Admin | Role::Staff => {
            let user = ctx
                .account_manager
                .find_user(&claims.sub)
                .await?
                .ok_or_else(|| IcuError::Unauthorized("User not found".to_string()))?;

            if !user.is_active {
                return Err(IcuError::Unauthorized(
                    "Account is deactivated. Please contact admin.".to_string(),
                ));
            }

            // The stored role wins over whatever the token claims
            Ok(match user.role {
                Role::Admin => Principal::Admin(user),
                _ => Principal::Staff(user),
            })
        }
    }
}

/// Require the principal's role to be one of `allowed`
pub fn authorize(principal: &Principal, allowed: &[Role]) -> IcuResult<()> {
    if allowed.contains(&principal.role()) {
        Ok(())
    } else {
        metrics::AUTH_FAILURES.with_label_values(&["forbidden"]).inc();
        Err(IcuError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            principal.role().as_str()
        )))
    }
}

async fn principal_from_parts(parts: &Parts, state: &AppContext) -> IcuResult<Principal> {
    let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
        metrics::AUTH_FAILURES.with_label_values(&["missing_token"]).inc();
        IcuError::Unauthorized("Not authorized to access this route".to_string())
    })?;

    authenticate(state, &token).await.map_err(|e| {
        metrics::AUTH_FAILURES.with_label_values(&["invalid_token"]).inc();
        e
    })
}

/// Any authenticated principal
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = IcuError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let principal = principal_from_parts(parts, state).await?;
        Ok(AuthContext { principal })
    }
}

/// Admin or staff
#[derive(Debug, Clone)]
pub struct StaffAuthContext {
    pub user: User,
}

#[async_trait]
impl FromRequestParts<AppContext> for StaffAuthContext {
    type Rejection = IcuError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let principal = principal_from_parts(parts, state).await?;
        authorize(&principal, &[Role::Admin, Role::Staff])?;

        match principal {
            Principal::Admin(user) | Principal::Staff(user) => Ok(StaffAuthContext { user }),
            Principal::Patient(_) => Err(IcuError::Forbidden(
                "User role patient is not authorized to access this route".to_string(),
            )),
        }
    }
}

/// Admin only
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub user: User,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = IcuError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let principal = principal_from_parts(parts, state).await?;
        authorize(&principal, &[Role::Admin])?;

        match principal {
            Principal::Admin(user) => {
                tracing::debug!("AdminAuthContext: admin {} authorized", user.id);
                Ok(AdminAuthContext { user })
            }
            other => Err(IcuError::Forbidden(format!(
                "User role {} is not authorized to access this route",
                other.role().as_str()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenService;
    use chrono::{Duration, Utc};

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("patient".parse::<Role>().unwrap(), Role::Patient);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Staff).unwrap(), "\"staff\"");
    }

    async fn seeded() -> (tempfile::TempDir, AppContext, User, User, Patient) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::for_tests(dir.path()).await;

        let admin = ctx
            .account_manager
            .create_admin("admin@example.com", "password", "Admin", None)
            .await
            .unwrap();
        let staff = ctx
            .account_manager
            .create_staff("nurse@example.com", "Nora", None, None, &admin.id)
            .await
            .unwrap();
        let patient = ctx
            .patient_manager
            .create_patient(crate::patient::sample_request("pat@example.com"), &admin.id)
            .await
            .unwrap();

        (dir, ctx, admin, staff, patient)
    }

    #[tokio::test]
    async fn test_authenticate_resolves_each_role() {
        let (_dir, ctx, admin, staff, patient) = seeded().await;

        let token = ctx.account_manager.issue_token(&admin).unwrap();
        assert!(matches!(
            authenticate(&ctx, &token).await.unwrap(),
            Principal::Admin(u) if u.id == admin.id
        ));

        let token = ctx.account_manager.issue_token(&staff).unwrap();
        assert_eq!(authenticate(&ctx, &token).await.unwrap().role(), Role::Staff);

        let token = ctx.token_service.issue_patient_token(&patient.id).unwrap();
        let principal = authenticate(&ctx, &token).await.unwrap();
        assert_eq!(principal.role(), Role::Patient);
        assert_eq!(principal.id(), patient.id);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_deleted_and_expired() {
        let (_dir, ctx, admin, staff, patient) = seeded().await;

        let token = ctx.account_manager.issue_token(&staff).unwrap();
        ctx.account_manager.delete_staff(&admin.id, &staff.id).await.unwrap();
        assert!(matches!(
            authenticate(&ctx, &token).await,
            Err(IcuError::Unauthorized(_))
        ));

        let expired = ctx
            .token_service
            .issue_at(&patient.id, Role::Patient, Utc::now() - Duration::hours(25), Duration::hours(24))
            .unwrap();
        assert!(matches!(
            authenticate(&ctx, &expired).await,
            Err(IcuError::InvalidToken(_))
        ));

        let foreign = TokenService::new("another-secret-key-for-testing-0123456789", 7)
            .issue_staff_token(&admin.id, Role::Admin)
            .unwrap();
        assert!(matches!(
            authenticate(&ctx, &foreign).await,
            Err(IcuError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_deactivated_staff() {
        let (_dir, ctx, admin, staff, _patient) = seeded().await;

        let token = ctx.account_manager.issue_token(&staff).unwrap();
        ctx.account_manager
            .set_staff_active(&admin.id, &staff.id, false)
            .await
            .unwrap();

        assert!(matches!(
            authenticate(&ctx, &token).await,
            Err(IcuError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize_and_patient_scope() {
        let (_dir, ctx, admin, staff, patient) = seeded().await;

        let admin = Principal::Admin(admin);
        let staff = Principal::Staff(staff);
        let patient_principal = Principal::Patient(patient.clone());

        assert!(authorize(&admin, &[Role::Admin]).is_ok());
        assert!(matches!(
            authorize(&staff, &[Role::Admin]),
            Err(IcuError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&patient_principal, &[Role::Admin, Role::Staff]),
            Err(IcuError::Forbidden(_))
        ));

        assert!(patient_principal.ensure_patient_access(&patient.id).is_ok());
        assert!(matches!(
            patient_principal.ensure_patient_access("someone-else"),
            Err(IcuError::Forbidden(_))
        ));
        assert!(staff.ensure_patient_access("anyone").is_ok());
        drop(ctx);
    }
}
