/// Account manager implementation using runtime queries
use crate::{
    account::{password, ActiveSchedule, User},
    auth::Role,
    error::{IcuError, IcuResult},
    token::TokenService,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, name, password_hash, role, phone, designation, created_by,
     is_active, is_logged_in, is_password_changed, shift_name, shift_start, shift_end,
     created_at, updated_at";

/// Emails are matched trimmed and lowercased everywhere
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    tokens: TokenService,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, tokens: TokenService) -> Self {
        Self { db, tokens }
    }

    /// Register an admin through the open registration path
    pub async fn create_admin(
        &self,
        email: &str,
        password: &str,
        name: &str,
        phone: Option<String>,
    ) -> IcuResult<User> {
        let user = self
            .insert_user(email, password, name, Role::Admin, phone, None, None, true)
            .await?;

        tracing::info!("Registered admin {} ({})", user.id, user.email);
        Ok(user)
    }

    /// Create a staff member owned by `created_by`.
    ///
    /// The initial password is the staff member's name exactly as given;
    /// `is_password_changed` stays false until they change it.
    pub async fn create_staff(
        &self,
        email: &str,
        name: &str,
        phone: Option<String>,
        designation: Option<String>,
        created_by: &str,
    ) -> IcuResult<User> {
        let user = self
            .insert_user(
                email,
                name,
                name,
                Role::Staff,
                phone,
                designation,
                Some(created_by.to_string()),
                false,
            )
            .await?;

        tracing::info!("Admin {} created staff {} ({})", created_by, user.id, user.email);
        Ok(user)
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_user(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
        phone: Option<String>,
        designation: Option<String>,
        created_by: Option<String>,
        is_password_changed: bool,
    ) -> IcuResult<User> {
        let email = normalize_email(email);

        if self.email_exists(&email).await? {
            return Err(IcuError::Conflict(
                "User already exists with this email".to_string(),
            ));
        }

        let password_hash = password::hash_password(password).await?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, role, phone, designation, created_by,
                                is_active, is_logged_in, is_password_changed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, 0, ?9, ?10, ?10)",
        )
        .bind(&id)
        .bind(&email)
        .bind(name)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(&phone)
        .bind(&designation)
        .bind(&created_by)
        .bind(is_password_changed)
        .bind(now)
        .execute(&self.db)
        .await;

        // A concurrent registration can still win the unique index
        if let Err(sqlx::Error::Database(ref db_err)) = result {
            if db_err.is_unique_violation() {
                return Err(IcuError::Conflict(
                    "User already exists with this email".to_string(),
                ));
            }
        }
        result?;

        Ok(User {
            id,
            email,
            name: name.to_string(),
            password_hash,
            role,
            phone,
            designation,
            created_by,
            is_active: true,
            is_logged_in: false,
            is_password_changed,
            active_schedule: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Compare a candidate password against the user's stored hash
    pub async fn verify_password(&self, user_id: &str, candidate: &str) -> IcuResult<bool> {
        match self.find_user(user_id).await? {
            Some(user) => password::verify_password(candidate, &user.password_hash).await,
            None => Ok(password::verify_dummy(candidate).await),
        }
    }

    /// Change a password after checking the current one
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> IcuResult<User> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(IcuError::Validation(
                "Please provide current and new password".to_string(),
            ));
        }

        let user = self.get_user(user_id).await?;

        if !password::verify_password(current_password, &user.password_hash).await? {
            return Err(IcuError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = password::hash_password(new_password).await?;

        sqlx::query(
            "UPDATE users SET password_hash = ?1, is_password_changed = 1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.db)
        .await?;

        tracing::info!("Password changed for user {}", user_id);
        self.get_user(user_id).await
    }

    /// Authenticate with email and password, returning the user and a token.
    ///
    /// `login_as`, when given, must equal the user's role even if the
    /// password is correct.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        login_as: Option<&str>,
    ) -> IcuResult<(User, String)> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(IcuError::Validation(
                "Please provide email and password".to_string(),
            ));
        }

        let user = match self.find_user_by_email(email).await? {
            Some(user) => user,
            None => {
                password::verify_dummy(password).await;
                return Err(IcuError::Unauthorized("Invalid credentials".to_string()));
            }
        };

        if !password::verify_password(password, &user.password_hash).await? {
            return Err(IcuError::Unauthorized("Invalid credentials".to_string()));
        }

        if let Some(portal) = login_as {
            if portal != user.role.as_str() {
                return Err(IcuError::Unauthorized(format!(
                    "Access denied. You are registered as {}, please login from the correct portal.",
                    user.role.as_str()
                )));
            }
        }

        if !user.is_active {
            return Err(IcuError::Unauthorized(
                "Account is deactivated. Please contact admin.".to_string(),
            ));
        }

        self.set_logged_in(&user.id, true).await?;
        let token = self.tokens.issue_staff_token(&user.id, user.role)?;

        tracing::info!("User {} logged in as {}", user.id, user.role.as_str());

        Ok((
            User {
                is_logged_in: true,
                ..user
            },
            token,
        ))
    }

    /// Issue a fresh token for an existing user
    pub fn issue_token(&self, user: &User) -> IcuResult<String> {
        self.tokens.issue_staff_token(&user.id, user.role)
    }

    /// Clear the last-known session flag. Does not revoke tokens.
    pub async fn logout(&self, user_id: &str) -> IcuResult<()> {
        self.set_logged_in(user_id, false).await
    }

    async fn set_logged_in(&self, user_id: &str, logged_in: bool) -> IcuResult<()> {
        sqlx::query("UPDATE users SET is_logged_in = ?1 WHERE id = ?2")
            .bind(logged_in)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Staff created by this admin, newest first
    pub async fn list_staff_created_by(&self, admin_id: &str) -> IcuResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE created_by = ?1 AND role = 'staff'
             ORDER BY created_at DESC, rowid DESC",
            USER_COLUMNS
        ))
        .bind(admin_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    /// Get user by id
    pub async fn get_user(&self, user_id: &str) -> IcuResult<User> {
        self.find_user(user_id)
            .await?
            .ok_or_else(|| IcuError::NotFound("User not found".to_string()))
    }

    /// Look up a user by id without failing on absence
    pub async fn find_user(&self, user_id: &str) -> IcuResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> IcuResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))
            .bind(normalize_email(email))
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn email_exists(&self, email: &str) -> IcuResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Update name and/or phone
    pub async fn update_profile(
        &self,
        user_id: &str,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> IcuResult<User> {
        let user = self.get_user(user_id).await?;

        let name = name.filter(|n| !n.trim().is_empty()).unwrap_or(&user.name);
        let phone = phone
            .filter(|p| !p.trim().is_empty())
            .map(String::from)
            .or(user.phone);

        sqlx::query("UPDATE users SET name = ?1, phone = ?2, updated_at = ?3 WHERE id = ?4")
            .bind(name)
            .bind(&phone)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.db)
            .await?;

        self.get_user(user_id).await
    }

    /// Load a staff member that `admin_id` is allowed to manage
    async fn get_managed_staff(&self, admin_id: &str, staff_id: &str) -> IcuResult<User> {
        let user = self
            .find_user(staff_id)
            .await?
            .ok_or_else(|| IcuError::NotFound("Staff not found".to_string()))?;

        if user.role != Role::Staff {
            return Err(IcuError::Validation(
                "Operation only applies to staff members".to_string(),
            ));
        }

        if user.created_by.as_deref() != Some(admin_id) {
            return Err(IcuError::Forbidden(
                "Staff member belongs to another admin".to_string(),
            ));
        }

        Ok(user)
    }

    /// Assign a shift to a staff member
    pub async fn update_staff_shift(
        &self,
        admin_id: &str,
        staff_id: &str,
        schedule: &ActiveSchedule,
    ) -> IcuResult<User> {
        self.get_managed_staff(admin_id, staff_id).await?;

        sqlx::query(
            "UPDATE users SET shift_name = ?1, shift_start = ?2, shift_end = ?3, updated_at = ?4
             WHERE id = ?5",
        )
        .bind(&schedule.shift_name)
        .bind(&schedule.start_time)
        .bind(&schedule.end_time)
        .bind(Utc::now())
        .bind(staff_id)
        .execute(&self.db)
        .await?;

        tracing::info!("Admin {} assigned shift {} to {}", admin_id, schedule.shift_name, staff_id);
        self.get_user(staff_id).await
    }

    /// Deactivate or reactivate a staff member
    pub async fn set_staff_active(
        &self,
        admin_id: &str,
        staff_id: &str,
        active: bool,
    ) -> IcuResult<User> {
        self.get_managed_staff(admin_id, staff_id).await?;

        sqlx::query("UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(active)
            .bind(Utc::now())
            .bind(staff_id)
            .execute(&self.db)
            .await?;

        tracing::info!("Admin {} set staff {} active={}", admin_id, staff_id, active);
        self.get_user(staff_id).await
    }

    /// Delete a staff member
    pub async fn delete_staff(&self, admin_id: &str, staff_id: &str) -> IcuResult<()> {
        self.get_managed_staff(admin_id, staff_id).await?;

        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(staff_id)
            .execute(&self.db)
            .await?;

        tracing::info!("Admin {} deleted staff {}", admin_id, staff_id);
        Ok(())
    }
}

fn user_from_row(row: &SqliteRow) -> IcuResult<User> {
    let role: String = row.get("role");
    let shift_name: Option<String> = row.get("shift_name");
    let shift_start: Option<String> = row.get("shift_start");
    let shift_end: Option<String> = row.get("shift_end");

    let active_schedule = match (shift_name, shift_start, shift_end) {
        (Some(shift_name), Some(start_time), Some(end_time)) => Some(ActiveSchedule {
            shift_name,
            start_time,
            end_time,
        }),
        _ => None,
    };

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        role: Role::from_str(&role)?,
        phone: row.get("phone"),
        designation: row.get("designation"),
        created_by: row.get("created_by"),
        is_active: row.get("is_active"),
        is_logged_in: row.get("is_logged_in"),
        is_password_changed: row.get("is_password_changed"),
        active_schedule,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
