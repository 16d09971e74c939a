//! Application profile model.
//!
//! A profile is the application-level record for an identity: display name,
//! role and department. It is keyed by the identity id and cascade-deleted
//! with it.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

use super::{Role, User};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub department: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: String,
}

impl Profile {
    /// Parsed role. An unknown role string in the database degrades to
    /// Teacher, the least-privileged role.
    pub fn role(&self) -> Role {
        Role::from_str(&self.role).unwrap_or(Role::Teacher)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Profile>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM profiles ORDER BY full_name COLLATE NOCASE")
            .fetch_all(pool)
            .await
    }

    /// Insert-or-update keyed by the identity id. Used both when provisioning
    /// a new user and when repairing a missing or stale profile row, so the
    /// latest call's name/role/department always win.
    pub async fn upsert(
        pool: &SqlitePool,
        id: &str,
        email: &str,
        full_name: &str,
        role: Role,
        department: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, email, full_name, role, department, updated_at)
            VALUES (?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                full_name = excluded.full_name,
                role = excluded.role,
                department = excluded.department,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(full_name)
        .bind(role.as_str())
        .bind(department)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Resolve the profile for an identity, falling back to identity-derived
    /// defaults when the profile row is absent: display name from the email
    /// local part and the least-privileged role.
    pub async fn resolve(pool: &SqlitePool, user: &User) -> Result<Profile, sqlx::Error> {
        if let Some(profile) = Self::find_by_id(pool, &user.id).await? {
            return Ok(profile);
        }

        let fallback_name = user
            .email
            .split('@')
            .next()
            .unwrap_or(user.email.as_str())
            .to_string();

        Ok(Profile {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name: fallback_name,
            role: Role::Teacher.as_str().to_string(),
            department: None,
            avatar_url: None,
            updated_at: user.updated_at.clone(),
        })
    }
}

/// Profile as returned by the API, with the role parsed.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub department: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        let role = profile.role();
        Self {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            role,
            department: profile.department,
            avatar_url: profile.avatar_url,
        }
    }
}
