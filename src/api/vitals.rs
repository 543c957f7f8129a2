/// Vital sign endpoints
use crate::{
    api::middleware::{ApiResponse, ValidatedJson},
    auth::{AuthContext, StaffAuthContext},
    context::AppContext,
    error::IcuResult,
    vital::{CreateVitalRequest, UpdateVitalRequest, Vital, VitalListQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

/// Build vital routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/vitals", post(create_vital))
        .route(
            "/vitals/:id",
            get(get_vital).put(update_vital).delete(delete_vital),
        )
        .route("/vitals/patient/:patient_id", get(list_patient_vitals))
        .route("/vitals/patient/:patient_id/latest", get(latest_vital))
}

async fn create_vital(
    State(ctx): State<AppContext>,
    auth: StaffAuthContext,
    ValidatedJson(req): ValidatedJson<CreateVitalRequest>,
) -> IcuResult<(StatusCode, Json<ApiResponse<Vital>>)> {
    let vital = ctx.vital_manager.create_vital(req, &auth.user.id).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Vital record created successfully", vital),
    ))
}

async fn get_vital(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> IcuResult<Json<ApiResponse<Vital>>> {
    let vital = ctx.vital_manager.get_vital(&id).await?;
    auth.principal.ensure_patient_access(&vital.patient_id)?;

    Ok(ApiResponse::data(vital))
}

async fn update_vital(
    State(ctx): State<AppContext>,
    _auth: StaffAuthContext,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateVitalRequest>,
) -> IcuResult<Json<ApiResponse<Vital>>> {
    let vital = ctx.vital_manager.update_vital(&id, req).await?;
    Ok(ApiResponse::with_message("Vital record updated successfully", vital))
}

async fn delete_vital(
    State(ctx): State<AppContext>,
    _auth: StaffAuthContext,
    Path(id): Path<String>,
) -> IcuResult<Json<ApiResponse<()>>> {
    ctx.vital_manager.delete_vital(&id).await?;
    Ok(ApiResponse::with_message("Vital record deleted successfully", ()))
}

/// `?timeRange=1h|24h|7d`; other values list everything
async fn list_patient_vitals(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(patient_id): Path<String>,
    Query(query): Query<VitalListQuery>,
) -> IcuResult<Json<ApiResponse<Vec<Vital>>>> {
    auth.principal.ensure_patient_access(&patient_id)?;

    let vitals = ctx
        .vital_manager
        .list_patient_vitals(&patient_id, query.range())
        .await?;

    Ok(ApiResponse::list(vitals))
}

async fn latest_vital(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(patient_id): Path<String>,
) -> IcuResult<Json<ApiResponse<Vital>>> {
    auth.principal.ensure_patient_access(&patient_id)?;

    let vital = ctx.vital_manager.latest_vital(&patient_id).await?;
    Ok(ApiResponse::data(vital))
}
