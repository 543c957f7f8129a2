/// Report endpoints: text notes, file uploads and downloads
use crate::{
    api::middleware::{read_upload_form, ApiResponse, JsonBody, ValidatedJson},
    auth::{AdminAuthContext, AuthContext, StaffAuthContext},
    context::AppContext,
    error::IcuResult,
    report::{
        AiResultRequest, CreateTextReportRequest, FileReportFields, Report, ReportCategory,
        ReportListQuery, UpdateReportRequest,
    },
};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

/// Multipart framing allowance on top of the file size cap
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build report routes; `max_upload_bytes` caps the upload body
pub fn routes(max_upload_bytes: usize) -> Router<AppContext> {
    Router::new()
        .route("/reports/text", post(create_text_report))
        .route(
            "/reports/upload",
            post(upload_file_report)
                .layer(DefaultBodyLimit::max(max_upload_bytes + FORM_OVERHEAD_BYTES)),
        )
        .route("/reports/orphans", get(list_orphans))
        .route("/reports/patient/:patient_id", get(list_patient_reports))
        .route(
            "/reports/:id",
            get(get_report).put(update_report).delete(delete_report),
        )
        .route("/reports/:id/download", get(download_report))
        .route("/reports/:id/ai-result", put(record_ai_result))
}

async fn create_text_report(
    State(ctx): State<AppContext>,
    auth: StaffAuthContext,
    ValidatedJson(req): ValidatedJson<CreateTextReportRequest>,
) -> IcuResult<(StatusCode, Json<ApiResponse<Report>>)> {
    let report = ctx
        .report_manager
        .create_text_report(req, &auth.user.id)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Report created successfully", report),
    ))
}

/// Multipart upload with the artifact in field `file`
async fn upload_file_report(
    State(ctx): State<AppContext>,
    auth: StaffAuthContext,
    multipart: Multipart,
) -> IcuResult<(StatusCode, Json<ApiResponse<Report>>)> {
    let mut form = read_upload_form(multipart, "file").await?;
    let upload = form.take_file()?;

    let category = match form.field("category").map(str::trim) {
        Some(value) if !value.is_empty() => value.parse::<ReportCategory>()?,
        _ => ReportCategory::default(),
    };

    let fields = FileReportFields {
        patient_id: form.field("patientId").unwrap_or_default().trim().to_string(),
        title: form.field("title").unwrap_or_default().trim().to_string(),
        category,
        description: form.field("description").unwrap_or_default().to_string(),
        tags: form.field("tags").map(String::from),
    };

    let outcome = ctx
        .report_manager
        .create_file_report(fields, upload, &auth.user.id)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::outcome("File uploaded successfully", outcome),
    ))
}

/// File reports whose artifact is missing
async fn list_orphans(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
) -> IcuResult<Json<ApiResponse<Vec<Report>>>> {
    let orphans = ctx.report_manager.find_orphans().await?;
    Ok(ApiResponse::list(orphans))
}

async fn list_patient_reports(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(patient_id): Path<String>,
    Query(query): Query<ReportListQuery>,
) -> IcuResult<Json<ApiResponse<Vec<Report>>>> {
    auth.principal.ensure_patient_access(&patient_id)?;

    let reports = ctx
        .report_manager
        .list_patient_reports(&patient_id, query.report_type, query.category)
        .await?;

    Ok(ApiResponse::list(reports))
}

async fn get_report(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> IcuResult<Json<ApiResponse<Report>>> {
    let report = ctx.report_manager.get_report(&id).await?;
    auth.principal.ensure_patient_access(&report.patient_id)?;

    Ok(ApiResponse::data(report))
}

async fn update_report(
    State(ctx): State<AppContext>,
    _auth: StaffAuthContext,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateReportRequest>,
) -> IcuResult<Json<ApiResponse<Report>>> {
    let report = ctx.report_manager.update_report(&id, req).await?;
    Ok(ApiResponse::with_message("Report updated successfully", report))
}

async fn delete_report(
    State(ctx): State<AppContext>,
    _auth: StaffAuthContext,
    Path(id): Path<String>,
) -> IcuResult<Json<ApiResponse<()>>> {
    let outcome = ctx.report_manager.delete_report(&id).await?;
    Ok(ApiResponse::outcome("Report deleted successfully", outcome))
}

/// Send the artifact under its original file name
async fn download_report(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> IcuResult<Response> {
    let report = ctx.report_manager.get_report(&id).await?;
    auth.principal.ensure_patient_access(&report.patient_id)?;

    let download = ctx.report_manager.open_download(&report).await?;
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&download.file_name)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, download.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}

/// Write-back from the AI service
async fn record_ai_result(
    State(ctx): State<AppContext>,
    _auth: StaffAuthContext,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<AiResultRequest>,
) -> IcuResult<Json<ApiResponse<Report>>> {
    let report = ctx
        .report_manager
        .record_ai_result(&id, &req.extracted_text, &req.summary)
        .await?;

    Ok(ApiResponse::with_message("AI result recorded", report))
}
