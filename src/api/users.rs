//! Admin user directory: provisioning and deletion of accounts.
//!
//! These endpoints mutate identity records, not just business data, so they
//! are gated on the Admin role. Provisioning is idempotent: an already
//! registered email is recovered by lookup and its profile repaired with the
//! latest values instead of failing.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::db::{Profile, Role, User};
use crate::AppState;

use super::auth::{self, CurrentUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_department, validate_email, validate_full_name, validate_role,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub role: String,
    #[serde(default)]
    pub dept: Option<String>,
}

/// Success envelope for the admin user API.
#[derive(Debug, Serialize)]
pub struct UserActionResponse {
    pub success: bool,
    pub message: String,
}

fn validate_create_request(req: &CreateUserRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_full_name(&req.full_name) {
        errors.add("fullName", e);
    }
    if let Err(e) = validate_role(&req.role) {
        errors.add("role", e);
    }
    if let Some(dept) = &req.dept {
        if let Err(e) = validate_department(dept) {
            errors.add("dept", e);
        }
    }

    errors.finish()
}

/// Invite-or-create a user and upsert their profile.
///
/// POST /api/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<UserActionResponse>, ApiError> {
    current.require_admin()?;
    validate_create_request(&request)?;

    let role = Role::from_str(&request.role).map_err(|e| ApiError::validation_field("role", e))?;

    // Recover the existing identity when the email is already registered, so
    // a missing or stale profile row can be repaired by re-provisioning.
    let (user_id, newly_created) = match User::find_by_email(&state.db, &request.email).await? {
        Some(existing) => (existing.id, false),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            // Placeholder credential; the account stays unusable until the
            // invitee sets a password through the emailed token.
            let placeholder = auth::hash_password(&auth::generate_token())
                .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
            User::insert(&state.db, &id, &request.email, &placeholder).await?;
            (id, true)
        }
    };

    Profile::upsert(
        &state.db,
        &user_id,
        &request.email,
        &request.full_name,
        role,
        request.dept.as_deref(),
    )
    .await?;

    if newly_created {
        let ttl = state.config.auth.reset_ttl_hours;
        let token = auth::issue_reset_token(&state.db, &user_id, ttl).await?;
        let url = auth::password_setup_url(&state.config.server.public_url, &token);
        if let Err(e) = state
            .mailer
            .send_invitation_email(&request.email, &request.full_name, role.as_str(), &url, ttl)
            .await
        {
            tracing::error!(error = %e, "Failed to send invitation email");
        }
    }

    info!(
        user_id = %user_id,
        email = %request.email,
        role = %role,
        created = newly_created,
        admin = %current.user.id,
        "User provisioned"
    );

    let message = if newly_created {
        "Invitation sent! User must set a password to log in.".to_string()
    } else {
        "Existing account updated.".to_string()
    };

    Ok(Json(UserActionResponse {
        success: true,
        message,
    }))
}

/// Delete an identity and everything hanging off it (profile, sessions, DTR
/// logs) via cascade. An already-missing profile row is not an error.
///
/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<UserActionResponse>, ApiError> {
    current.require_admin()?;

    if current.user.id == id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    if !User::delete(&state.db, &id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user_id = %id, admin = %current.user.id, "User deleted");

    Ok(Json(UserActionResponse {
        success: true,
        message: "User deleted".to_string(),
    }))
}

/// List all profiles for the user-management view.
///
/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<Vec<Profile>>, ApiError> {
    current.require_admin()?;
    let profiles = Profile::list_all(&state.db).await?;
    Ok(Json(profiles))
}
