/// Chat image uploads
use crate::{
    api::middleware::{read_upload_form, ApiResponse},
    auth::AuthContext,
    context::AppContext,
    error::{IcuError, IcuResult},
    file_store::{StoredArtifact, UploadConstraints},
};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build chat routes; `max_image_bytes` caps the image body
pub fn routes(max_image_bytes: usize) -> Router<AppContext> {
    Router::new().route(
        "/chat/analyze-image/:patient_id",
        post(analyze_image).layer(DefaultBodyLimit::max(max_image_bytes + FORM_OVERHEAD_BYTES)),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatImageResponse {
    pub image_url: String,
    pub patient_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Store a chat image in field `image` for a patient.
///
/// The image is written before the patient checks; it is removed again when
/// the patient is missing or the caller may not reach them.
async fn analyze_image(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(patient_id): Path<String>,
    multipart: Multipart,
) -> IcuResult<Json<ApiResponse<ChatImageResponse>>> {
    let mut form = read_upload_form(multipart, "image").await?;
    let upload = form
        .file
        .take()
        .ok_or_else(|| IcuError::Validation("No image uploaded".to_string()))?;

    let constraints = UploadConstraints::chat_images(ctx.config.uploads.chat_image_max_bytes);
    let artifact = ctx.chat_images.store(upload, &constraints).await?;

    if let Err(e) = check_patient(&ctx, &auth, &patient_id).await {
        discard(&ctx, &artifact).await;
        return Err(e);
    }

    tracing::info!("Stored chat image {} for patient {}", artifact.filename, patient_id);

    Ok(ApiResponse::data(ChatImageResponse {
        image_url: artifact.locator,
        patient_id,
        message: form
            .field("message")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Please analyze this image")
            .to_string(),
        timestamp: Utc::now(),
    }))
}

async fn check_patient(ctx: &AppContext, auth: &AuthContext, patient_id: &str) -> IcuResult<()> {
    if !ctx.patient_manager.exists(patient_id).await? {
        return Err(IcuError::NotFound("Patient not found".to_string()));
    }
    auth.principal.ensure_patient_access(patient_id)
}

async fn discard(ctx: &AppContext, artifact: &StoredArtifact) {
    let cleaned = ctx.chat_images.delete(&artifact.locator).await;
    if let Err(e) = &cleaned {
        tracing::warn!("Failed to remove chat image {}: {}", artifact.filename, e);
    }
    crate::metrics::record_artifact_cleanup(cleaned.is_ok());
}
