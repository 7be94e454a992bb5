use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Legacy single-role label. Written as a cache on every role-set
    /// change; authorization never reads it.
    pub role: Option<String>,
    pub provider: String,
    pub provider_id: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_approved(&self) -> bool {
        self.approved_at.is_some()
    }
}

impl crate::events::Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Option<String>,
    pub provider: String,
    pub provider_id: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: value.id,
            name: value.name,
            email: value.email,
            role: value.role,
            provider: value.provider,
            provider_id: value.provider_id,
            approved_at: value.approved_at,
            approved_by: value.approved_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

/// Identity-provider callback payload. The provider handshake happens
/// upstream; by the time this arrives the email has been verified.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SsoCallbackRequest {
    #[schema(example = "google")]
    pub provider: String,
    pub provider_id: Option<String>,
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Optional 1:1 employment details for a staff user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StaffProfile {
    pub user_id: Uuid,
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub employment_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StaffProfileInput {
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub employment_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StaffUpdateRequest {
    pub name: String,
    pub email: String,
    /// When present, replaces the target's role set.
    pub role_ids: Option<Vec<Uuid>>,
    pub profile: Option<StaffProfileInput>,
}

/// Staff detail view: the user, their profile, and today's shifts.
#[derive(Debug, Serialize, ToSchema)]
pub struct StaffDetail {
    pub user: User,
    pub profile: Option<StaffProfile>,
    pub today_shifts: Vec<crate::models::shift::Shift>,
}
