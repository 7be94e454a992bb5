use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ShiftStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// A scheduled unit of work: one client, one staff member, one time
/// window. The assigned staff user owns the shift for visibility.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Shift {
    pub id: Uuid,
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: ShiftStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Loggable for Shift {
    fn entity_type() -> &'static str { "shift" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ShiftCreateRequest {
    pub client_id: Uuid,
    /// Assigned staff member.
    pub user_id: Uuid,
    #[schema(format = DateTime, example = "2026-02-03T09:00:00Z")]
    pub starts_at: DateTime<Utc>,
    #[schema(format = DateTime, example = "2026-02-03T17:00:00Z")]
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: Option<ShiftStatus>,
}

/// Full update; the window fields are mandatory like on create.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ShiftUpdateRequest {
    pub client_id: Uuid,
    pub user_id: Uuid,
    #[schema(format = DateTime, example = "2026-02-03T09:00:00Z")]
    pub starts_at: DateTime<Utc>,
    #[schema(format = DateTime, example = "2026-02-03T17:00:00Z")]
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: Option<ShiftStatus>,
}

/// Partial update used by calendar drag/resize. If either time is
/// supplied, both must be, and the merged window must still validate.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ShiftPatchRequest {
    pub client_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: Option<ShiftStatus>,
}

/// One calendar feed entry, shaped for the scheduling UI.
#[derive(Debug, Serialize, ToSchema)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: ShiftStatus,
    pub client: String,
    pub staff: String,
}
