use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tri-state override mode as submitted by the access screen.
/// `Inherit` deletes the row; `Allow`/`Deny` upsert it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    Inherit,
    Allow,
    Deny,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AccessUpdateRequest {
    /// Full replacement role set for the target user.
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
    /// permission_id -> inherit | allow | deny
    #[serde(default)]
    #[schema(value_type = Object)]
    pub overrides: HashMap<Uuid, OverrideMode>,
}

/// Approval carries the same access payload; at least one role is
/// required so the approved account resolves to something.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveUserRequest {
    pub role_ids: Vec<Uuid>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub overrides: HashMap<Uuid, OverrideMode>,
}

/// One row of the access management screen.
#[derive(Debug, Serialize, ToSchema)]
pub struct AccessUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Legacy denormalized label, display only.
    pub role: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub roles: Vec<Role>,
    /// permission_id -> allowed
    #[schema(value_type = Object)]
    pub overrides: HashMap<Uuid, bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessIndexResponse {
    pub users: Vec<AccessUser>,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}
