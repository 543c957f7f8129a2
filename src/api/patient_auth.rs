/// Patient portal login by one-time code
use crate::{
    api::middleware::{ApiResponse, ValidatedJson},
    context::AppContext,
    error::IcuResult,
    otp::{RequestOtpRequest, VerifyOtpRequest},
    patient::PatientSummary,
};
use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Build patient auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/patient-auth/request-otp", post(request_otp))
        .route("/patient-auth/verify-otp", post(verify_otp))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssuedResponse {
    pub email: String,
    pub expires_at: DateTime<Utc>,
    /// Only present when debug echo is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_otp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PatientSessionResponse {
    pub patient: PatientSummary,
    pub token: String,
}

async fn request_otp(
    State(ctx): State<AppContext>,
    ValidatedJson(req): ValidatedJson<RequestOtpRequest>,
) -> IcuResult<Json<ApiResponse<OtpIssuedResponse>>> {
    let issued = ctx
        .otp_service
        .request_challenge(&req.name, &req.phone, &req.email)
        .await?;

    let debug_otp = ctx.config.otp.expose_debug_code.then_some(issued.code);

    Ok(ApiResponse::with_message(
        "OTP sent to your email",
        OtpIssuedResponse {
            email: issued.email,
            expires_at: issued.expires_at,
            debug_otp,
        },
    ))
}

async fn verify_otp(
    State(ctx): State<AppContext>,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> IcuResult<Json<ApiResponse<PatientSessionResponse>>> {
    let (patient, token) = ctx
        .otp_service
        .verify_challenge(&req.email, &req.otp)
        .await?;

    Ok(ApiResponse::with_message(
        "Login successful",
        PatientSessionResponse {
            patient: PatientSummary::from(&patient),
            token,
        },
    ))
}
