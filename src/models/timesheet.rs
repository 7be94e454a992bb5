use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TimesheetStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

/// A record of actually-worked time, owned by the staff member it was
/// logged against (who may differ from the creator).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Timesheet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub shift_id: Option<Uuid>,
    pub work_date: NaiveDate,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub break_minutes: i64,
    pub notes: Option<String>,
    pub status: TimesheetStatus,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Loggable for Timesheet {
    fn entity_type() -> &'static str { "timesheet" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TimesheetCreateRequest {
    pub client_id: Uuid,
    /// Seed the record from an existing shift; the shift's assigned staff
    /// member becomes the owner.
    pub shift_id: Option<Uuid>,
    #[schema(example = "2026-02-03")]
    pub work_date: NaiveDate,
    #[schema(format = DateTime, example = "2026-02-03T09:00:00Z")]
    pub starts_at: DateTime<Utc>,
    #[schema(format = DateTime, example = "2026-02-03T17:00:00Z")]
    pub ends_at: DateTime<Utc>,
    pub break_minutes: Option<i64>,
    pub notes: Option<String>,
    /// Only `draft` or `submitted` may be requested at creation.
    pub status: Option<TimesheetStatus>,
}

/// Field edits and the approve/reject decision share this request, but
/// the two paths are disjoint: when a decision flag is set, field edits
/// are not applied.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TimesheetUpdateRequest {
    pub client_id: Option<Uuid>,
    pub work_date: Option<NaiveDate>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub break_minutes: Option<i64>,
    pub notes: Option<String>,
    /// Only `draft` or `submitted` may be set through the field path.
    pub status: Option<TimesheetStatus>,
    #[serde(default)]
    pub approve: bool,
    #[serde(default)]
    pub reject: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TimesheetListQuery {
    pub status: Option<TimesheetStatus>,
    #[schema(example = "2026-02-01")]
    pub from: Option<NaiveDate>,
    #[schema(example = "2026-02-28")]
    pub to: Option<NaiveDate>,
}
