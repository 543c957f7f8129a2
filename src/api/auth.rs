/// Admin and staff account endpoints under /auth
use crate::{
    account::{
        ActiveSchedule, ChangePasswordRequest, CreateStaffRequest, LoginRequest, RegisterRequest,
        SessionResponse, SetActiveRequest, UpdateProfileRequest, User,
    },
    api::middleware::{ApiResponse, JsonBody, ValidatedJson},
    auth::{AdminAuthContext, AuthContext, Principal, StaffAuthContext},
    context::AppContext,
    error::IcuResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", get(logout))
        .route("/auth/me", get(me))
        .route("/auth/updatepassword", put(update_password))
        .route("/auth/updateprofile", put(update_profile))
        .route("/auth/create-staff", post(create_staff))
        .route("/auth/my-staff", get(my_staff))
        .route("/auth/staff/:id/shift", put(update_staff_shift))
        .route("/auth/staff/:id/status", put(set_staff_status))
        .route("/auth/staff/:id", delete(delete_staff))
}

/// Open admin registration
async fn register(
    State(ctx): State<AppContext>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> IcuResult<(StatusCode, Json<ApiResponse<SessionResponse>>)> {
    let user = ctx
        .account_manager
        .create_admin(&req.email, &req.password, &req.name, req.phone)
        .await?;
    let token = ctx.account_manager.issue_token(&user)?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Admin registered successfully", SessionResponse { user, token }),
    ))
}

async fn login(
    State(ctx): State<AppContext>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> IcuResult<Json<ApiResponse<SessionResponse>>> {
    let (user, token) = ctx
        .account_manager
        .login(&req.email, &req.password, req.portal())
        .await?;

    Ok(ApiResponse::with_message(
        "Login successful",
        SessionResponse { user, token },
    ))
}

/// Clears the session flag for staff and admins; patients have nothing to clear
async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> IcuResult<Json<ApiResponse<()>>> {
    if let Some(user) = auth.principal.user() {
        if let Err(e) = ctx.account_manager.logout(&user.id).await {
            tracing::warn!("Failed to clear login state for {}: {}", user.id, e);
        }
    }

    Ok(ApiResponse::with_message("Logged out successfully", ()))
}

async fn me(auth: AuthContext) -> Response {
    match auth.principal {
        Principal::Admin(user) | Principal::Staff(user) => ApiResponse::data(user).into_response(),
        Principal::Patient(patient) => ApiResponse::data(patient).into_response(),
    }
}

/// Change password and hand back a fresh token
async fn update_password(
    State(ctx): State<AppContext>,
    auth: StaffAuthContext,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> IcuResult<Json<ApiResponse<SessionResponse>>> {
    let user = ctx
        .account_manager
        .change_password(&auth.user.id, &req.current_password, &req.new_password)
        .await?;
    let token = ctx.account_manager.issue_token(&user)?;

    Ok(ApiResponse::with_message(
        "Password updated successfully",
        SessionResponse { user, token },
    ))
}

async fn update_profile(
    State(ctx): State<AppContext>,
    auth: StaffAuthContext,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> IcuResult<Json<ApiResponse<User>>> {
    let user = ctx
        .account_manager
        .update_profile(&auth.user.id, req.name.as_deref(), req.phone.as_deref())
        .await?;

    Ok(ApiResponse::with_message("Profile updated successfully", user))
}

async fn create_staff(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    ValidatedJson(req): ValidatedJson<CreateStaffRequest>,
) -> IcuResult<(StatusCode, Json<ApiResponse<User>>)> {
    let staff = ctx
        .account_manager
        .create_staff(&req.email, &req.name, req.phone, req.designation, &auth.user.id)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(
            "Staff created. Initial password is their name.",
            staff,
        ),
    ))
}

async fn my_staff(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
) -> IcuResult<Json<ApiResponse<Vec<User>>>> {
    let staff = ctx.account_manager.list_staff_created_by(&auth.user.id).await?;
    Ok(ApiResponse::list(staff))
}

async fn update_staff_shift(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(staff_id): Path<String>,
    ValidatedJson(schedule): ValidatedJson<ActiveSchedule>,
) -> IcuResult<Json<ApiResponse<User>>> {
    let staff = ctx
        .account_manager
        .update_staff_shift(&auth.user.id, &staff_id, &schedule)
        .await?;

    Ok(ApiResponse::with_message("Shift updated", staff))
}

async fn set_staff_status(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(staff_id): Path<String>,
    JsonBody(req): JsonBody<SetActiveRequest>,
) -> IcuResult<Json<ApiResponse<User>>> {
    let staff = ctx
        .account_manager
        .set_staff_active(&auth.user.id, &staff_id, req.is_active)
        .await?;

    let message = if req.is_active {
        "Staff activated"
    } else {
        "Staff deactivated"
    };
    Ok(ApiResponse::with_message(message, staff))
}

async fn delete_staff(
    State(ctx): State<AppContext>,
    auth: AdminAuthContext,
    Path(staff_id): Path<String>,
) -> IcuResult<Json<ApiResponse<()>>> {
    ctx.account_manager
        .delete_staff(&auth.user.id, &staff_id)
        .await?;

    Ok(ApiResponse::with_message("Staff deleted successfully", ()))
}
