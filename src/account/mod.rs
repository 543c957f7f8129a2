/// Staff and admin account management
///
/// Handles account creation, password verification and change, login state,
/// and the admin-scoped staff roster.

mod manager;
pub mod password;

pub use manager::{normalize_email, AccountManager};

use crate::auth::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Shift assigned to a staff member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSchedule {
    #[validate(length(min = 1, message = "Shift name is required"))]
    pub shift_name: String,
    #[validate(length(min = 1, message = "Start time is required"))]
    pub start_time: String,
    #[validate(length(min = 1, message = "End time is required"))]
    pub end_time: String,
}

/// Admin or staff account. The password hash never leaves the manager.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub designation: Option<String>,
    pub created_by: Option<String>,
    pub is_active: bool,
    pub is_logged_in: bool,
    pub is_password_changed: bool,
    pub active_schedule: Option<ActiveSchedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub phone: Option<String>,
}

/// Staff creation request (admin only)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStaffRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub phone: Option<String>,
    pub designation: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Portal the user claims to log in from; must match their role.
    /// Unknown portals are a failed login, not a malformed request.
    #[serde(default)]
    pub login_as: Option<String>,
}

impl LoginRequest {
    /// The claimed portal, with an empty value treated as absent
    pub fn portal(&self) -> Option<&str> {
        self.login_as.as_deref().filter(|p| !p.is_empty())
    }
}

/// User plus a fresh token
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
}

/// Password change request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Profile update request
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Staff activation toggle
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}
