use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ClientStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Client {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub status: ClientStatus,
    /// Optional link to a login-capable portal user.
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Loggable for Client {
    fn entity_type() -> &'static str { "client" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClientCreateRequest {
    #[schema(example = "June")]
    pub first_name: String,
    #[schema(example = "Osei")]
    pub last_name: String,
    pub status: Option<ClientStatus>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ClientUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: Option<ClientStatus>,
    pub user_id: Option<Uuid>,
}

/// Replacement set of support workers assigned to a client.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignWorkersRequest {
    #[serde(default)]
    pub user_ids: Vec<Uuid>,
}

/// Replacement set of clients assigned to a staff member.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignClientsRequest {
    #[serde(default)]
    pub client_ids: Vec<Uuid>,
}

/// Client detail with its assigned support workers.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub client: Client,
    pub support_workers: Vec<SupportWorker>,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct SupportWorker {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}
