/// Patient record endpoints
use crate::{
    api::middleware::{ApiResponse, ValidatedJson},
    auth::{AdminAuthContext, AuthContext, StaffAuthContext},
    context::AppContext,
    error::IcuResult,
    patient::{CreatePatientRequest, Patient, PatientListQuery, UpdatePatientRequest},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

/// Build patient routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route(
            "/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/patients/:id/discharge", put(discharge_patient))
        .route("/patients/:id/readmit", put(readmit_patient))
}

async fn list_patients(
    State(ctx): State<AppContext>,
    _auth: StaffAuthContext,
    Query(query): Query<PatientListQuery>,
) -> IcuResult<Json<ApiResponse<Vec<Patient>>>> {
    let patients = ctx.patient_manager.list_patients(query.status).await?;
    Ok(ApiResponse::list(patients))
}

/// Admit a patient and assign the next sequential patient id
async fn create_patient(
    State(ctx): State<AppContext>,
    auth: StaffAuthContext,
    ValidatedJson(req): ValidatedJson<CreatePatientRequest>,
) -> IcuResult<(StatusCode, Json<ApiResponse<Patient>>)> {
    let patient = ctx.patient_manager.create_patient(req, &auth.user.id).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Patient admitted successfully", patient),
    ))
}

/// Patients may read their own record
async fn get_patient(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> IcuResult<Json<ApiResponse<Patient>>> {
    auth.principal.ensure_patient_access(&id)?;

    let patient = ctx.patient_manager.get_patient(&id).await?;
    Ok(ApiResponse::data(patient))
}

async fn update_patient(
    State(ctx): State<AppContext>,
    _auth: StaffAuthContext,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdatePatientRequest>,
) -> IcuResult<Json<ApiResponse<Patient>>> {
    let patient = ctx.patient_manager.update_patient(&id, req).await?;
    Ok(ApiResponse::with_message("Patient updated successfully", patient))
}

async fn discharge_patient(
    State(ctx): State<AppContext>,
    _auth: StaffAuthContext,
    Path(id): Path<String>,
) -> IcuResult<Json<ApiResponse<Patient>>> {
    let patient = ctx.patient_manager.discharge_patient(&id).await?;
    Ok(ApiResponse::with_message("Patient discharged", patient))
}

async fn readmit_patient(
    State(ctx): State<AppContext>,
    _auth: StaffAuthContext,
    Path(id): Path<String>,
) -> IcuResult<Json<ApiResponse<Patient>>> {
    let patient = ctx.patient_manager.readmit_patient(&id).await?;
    Ok(ApiResponse::with_message("Patient readmitted", patient))
}

async fn delete_patient(
    State(ctx): State<AppContext>,
    _auth: AdminAuthContext,
    Path(id): Path<String>,
) -> IcuResult<Json<ApiResponse<()>>> {
    ctx.patient_manager.delete_patient(&id).await?;
    Ok(ApiResponse::with_message("Patient deleted successfully", ()))
}
