//! Authentication: login/logout, session resolution, password flows.
//!
//! Sessions are opaque random tokens, stored hashed. The `CurrentUser`
//! extractor is the identity resolver: it maps a bearer token to the
//! identity row plus its profile, failing closed with 401 when the session
//! is missing or expired.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::db::{
    Capability, DbPool, LoginRequest, LoginResponse, PasswordReset, Profile, ProfileResponse,
    Role, Session, User,
};
use crate::AppState;

use super::error::ApiError;
use super::validation::validate_password_strength;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random opaque token
pub(crate) fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Format a timestamp the way SQLite's datetime('now') renders, so expiry
/// comparisons in SQL stay plain string comparisons.
fn sql_timestamp(t: chrono::DateTime<chrono::Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// The resolved identity of the calling session.
pub struct CurrentUser {
    pub user: User,
    pub profile: Profile,
}

impl CurrentUser {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    /// 403 unless the caller may review DTR entries.
    pub fn require_reviewer(&self) -> Result<(), ApiError> {
        if self.role().is_reviewer() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Reviewer role required"))
        }
    }

    /// 403 unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role() == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin role required"))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        resolve_current_user(&state.db, &token).await
    }
}

/// Resolve a session token into identity + profile. Absence of a profile row
/// is not an error: defaults are synthesized from the identity so first-time
/// logins still land on a usable Teacher view.
pub async fn resolve_current_user(pool: &DbPool, token: &str) -> Result<CurrentUser, ApiError> {
    let token_hash = hash_token(token);
    let session = Session::find_valid(pool, &token_hash)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Session expired or invalid"))?;

    let user = User::find_by_id(pool, &session.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Session expired or invalid"))?;

    let profile = Profile::resolve(pool, &user).await?;
    Ok(CurrentUser { user, profile })
}

/// Login endpoint
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = User::find_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = generate_token();
    let expires_at = chrono::Utc::now()
        + chrono::Duration::days(state.config.auth.session_ttl_days);
    Session::insert(&state.db, &user.id, &hash_token(&token), &sql_timestamp(expires_at)).await?;

    let profile = Profile::resolve(&state.db, &user).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        profile: ProfileResponse::from(profile),
    }))
}

/// Logout: delete the calling session. Idempotent.
///
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = extract_token(&headers) {
        Session::delete_by_token(&state.db, &hash_token(&token)).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Current profile plus the capabilities the client may render.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub profile: ProfileResponse,
    pub capabilities: Vec<Capability>,
}

/// GET /api/auth/me
pub async fn me(current: CurrentUser) -> Json<MeResponse> {
    let capabilities = current.role().capabilities();
    Json(MeResponse {
        profile: ProfileResponse::from(current.profile),
        capabilities,
    })
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Issue a password-setup/reset token for a user and return the raw token.
pub(crate) async fn issue_reset_token(
    pool: &DbPool,
    user_id: &str,
    ttl_hours: i64,
) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let expires_at = chrono::Utc::now() + chrono::Duration::hours(ttl_hours);
    PasswordReset::insert(pool, user_id, &hash_token(&token), &sql_timestamp(expires_at)).await?;
    Ok(token)
}

pub(crate) fn password_setup_url(public_url: &str, token: &str) -> String {
    format!(
        "{}/update-password.html?token={}",
        public_url.trim_end_matches('/'),
        token
    )
}

/// Request a password reset link. Always answers 200 so the endpoint cannot
/// be used to probe which addresses have accounts.
///
/// POST /api/auth/password-reset
pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<StatusCode, ApiError> {
    if let Some(user) = User::find_by_email(&state.db, &request.email).await? {
        let ttl = state.config.auth.reset_ttl_hours;
        let token = issue_reset_token(&state.db, &user.id, ttl).await?;
        let url = password_setup_url(&state.config.server.public_url, &token);
        if let Err(e) = state
            .mailer
            .send_password_reset_email(&user.email, &url, ttl)
            .await
        {
            tracing::error!(error = %e, "Failed to send password reset email");
        }
    }
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Consume a reset/invitation token and set a new password. All existing
/// sessions of the user are revoked.
///
/// POST /api/auth/password
pub async fn set_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if let Some(error) = validate_password_strength(&request.new_password) {
        return Err(ApiError::validation_field("newPassword", error));
    }

    let reset = PasswordReset::find_valid(&state.db, &hash_token(&request.token))
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    let password_hash = hash_password(&request.new_password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    User::update_password(&state.db, &reset.user_id, &password_hash).await?;
    PasswordReset::consume(&state.db, &reset.user_id).await?;
    Session::delete_for_user(&state.db, &reset.user_id).await?;

    tracing::info!(user_id = %reset.user_id, "Password set via reset token");

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Self-service password change for an authenticated session.
///
/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if !verify_password(&request.current_password, &current.user.password_hash) {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }
    if let Some(error) = validate_password_strength(&request.new_password) {
        return Err(ApiError::validation_field("newPassword", error));
    }

    let password_hash = hash_password(&request.new_password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    User::update_password(&state.db, &current.user.id, &password_hash).await?;

    Ok(StatusCode::OK)
}

/// Ensure the bootstrap admin account exists. Runs at startup; a no-op when
/// the configured email is already registered.
pub async fn ensure_admin_user(
    pool: &DbPool,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    if User::find_by_email(pool, email).await?.is_some() {
        return Ok(());
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    User::insert(pool, &id, email, &password_hash).await?;
    Profile::upsert(pool, &id, email, "Administrator", Role::Admin, None).await?;

    tracing::info!(email = %email, "Created bootstrap admin user");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("S3cret-enough").unwrap();
        assert!(verify_password("S3cret-enough", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_token_hashing_is_stable() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn test_password_setup_url() {
        let url = password_setup_url("http://localhost:3000/", "abc");
        assert_eq!(url, "http://localhost:3000/update-password.html?token=abc");
    }

    #[tokio::test]
    async fn test_ensure_admin_user_is_idempotent() {
        let pool = db::init_memory().await.unwrap();
        ensure_admin_user(&pool, "admin@school.edu", "Adm1n-pass-ok").await.unwrap();
        ensure_admin_user(&pool, "admin@school.edu", "different-pass1").await.unwrap();
        assert_eq!(User::count(&pool).await.unwrap(), 1);

        let user = User::find_by_email(&pool, "admin@school.edu")
            .await
            .unwrap()
            .unwrap();
        let profile = Profile::resolve(&pool, &user).await.unwrap();
        assert_eq!(profile.role(), Role::Admin);
        // First password wins; the second call must not rotate it.
        assert!(verify_password("Adm1n-pass-ok", &user.password_hash));
    }

    #[tokio::test]
    async fn test_resolve_falls_back_without_profile() {
        let pool = db::init_memory().await.unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        User::insert(&pool, &id, "new.teacher@school.edu", "x").await.unwrap();

        let user = User::find_by_id(&pool, &id).await.unwrap().unwrap();
        let profile = Profile::resolve(&pool, &user).await.unwrap();
        assert_eq!(profile.role(), Role::Teacher);
        assert_eq!(profile.full_name, "new.teacher");
    }
}
