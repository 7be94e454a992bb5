use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{load_principal, permissions};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::shift::{CalendarEvent, Shift, ShiftCreateRequest, ShiftPatchRequest, ShiftStatus};
use crate::routes::shifts::{
    ensure_client_exists, ensure_shift_access, ensure_user_exists, ensure_window, fetch_shift,
    insert_shift,
};
use crate::utils::utc_now;

#[derive(Debug, Deserialize)]
pub struct CalendarEventsQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub staff_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct CalendarRow {
    id: Uuid,
    client_id: Uuid,
    user_id: Uuid,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    location: Option<String>,
    notes: Option<String>,
    status: ShiftStatus,
    client_first_name: String,
    client_last_name: String,
    staff_name: String,
}

#[utoipa::path(
    get,
    path = "/calendar/events",
    tag = "Calendar",
    params(
        ("start" = String, Query, description = "Window start"),
        ("end" = String, Query, description = "Window end"),
        ("staff_id" = Option<Uuid>, Query, description = "Staff filter, managers only"),
        ("client_id" = Option<Uuid>, Query, description = "Client filter, managers only"),
    ),
    responses(
        (status = 200, description = "Shifts in the window", body = [CalendarEvent]),
        (status = 403, description = "Missing calendar.viewAny"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn events(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CalendarEventsQuery>,
) -> AppResult<Json<Vec<CalendarEvent>>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::CALENDAR_VIEW_ANY)?;

    if query.end < query.start {
        return Err(AppError::validation("end must not be before start"));
    }

    let can_manage_any = principal.can(permissions::SHIFTS_MANAGE_ANY);

    let mut sql = String::from(
        r#"
        SELECT s.id, s.client_id, s.user_id, s.starts_at, s.ends_at, s.location, s.notes, s.status,
               c.first_name AS client_first_name, c.last_name AS client_last_name,
               u.name AS staff_name
        FROM shifts s
        INNER JOIN clients c ON c.id = s.client_id
        INNER JOIN users u ON u.id = s.user_id
        WHERE s.starts_at >= ? AND s.starts_at <= ?
        "#,
    );

    // Owned scope is forced server-side; filter parameters from
    // non-managers are ignored rather than widening the window.
    let staff_filter = if can_manage_any { query.staff_id } else { Some(principal.user_id) };
    let client_filter = if can_manage_any { query.client_id } else { None };

    if staff_filter.is_some() {
        sql.push_str(" AND s.user_id = ?");
    }
    if client_filter.is_some() {
        sql.push_str(" AND s.client_id = ?");
    }
    sql.push_str(" ORDER BY s.starts_at");

    let mut q = sqlx::query_as::<_, CalendarRow>(&sql).bind(query.start).bind(query.end);
    if let Some(staff_id) = staff_filter {
        q = q.bind(staff_id);
    }
    if let Some(client_id) = client_filter {
        q = q.bind(client_id);
    }

    let rows = q.fetch_all(&state.pool).await?;

    let events = rows
        .into_iter()
        .map(|row| {
            let client_name = format!("{} {}", row.client_first_name, row.client_last_name);
            let title = if can_manage_any {
                format!("{} · {}", client_name, row.staff_name)
            } else {
                client_name.clone()
            };

            CalendarEvent {
                id: row.id,
                title,
                start: row.starts_at,
                end: row.ends_at,
                client_id: row.client_id,
                user_id: row.user_id,
                location: row.location,
                notes: row.notes,
                status: row.status,
                client: client_name,
                staff: row.staff_name,
            }
        })
        .collect();

    Ok(Json(events))
}

#[utoipa::path(
    post,
    path = "/calendar/shifts",
    operation_id = "calendar_create_shift",
    tag = "Calendar",
    request_body = ShiftCreateRequest,
    responses(
        (status = 201, description = "Shift created", body = Shift),
        (status = 403, description = "Missing shifts.create"),
        (status = 422, description = "ends_at must be after starts_at"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_shift(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<ShiftCreateRequest>,
) -> AppResult<(StatusCode, Json<Shift>)> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::SHIFTS_CREATE)?;

    let shift = insert_shift(&state, &principal, payload).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &shift,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(shift)))
}

#[utoipa::path(
    patch,
    path = "/calendar/shifts/{id}",
    tag = "Calendar",
    params(("id" = Uuid, Path, description = "Shift id")),
    request_body = ShiftPatchRequest,
    responses(
        (status = 200, description = "Shift updated", body = Shift),
        (status = 403, description = "Not the assigned staff member"),
        (status = 404, description = "Shift not found"),
        (status = 422, description = "Incomplete time pair or invalid window"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn patch_shift(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShiftPatchRequest>,
) -> AppResult<Json<Shift>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::SHIFTS_UPDATE)?;

    let old = fetch_shift(&state.pool, id).await?;
    ensure_shift_access(&principal, &old)?;

    // Drag/resize sends only times. A lone starts_at or ends_at would be
    // merged with a stale counterpart, so the pair is all-or-nothing.
    if payload.starts_at.is_some() != payload.ends_at.is_some() {
        return Err(AppError::validation(
            "both starts_at and ends_at are required when updating time",
        ));
    }

    let mut shift = old.clone();
    if let Some(client_id) = payload.client_id {
        ensure_client_exists(&state.pool, client_id).await?;
        shift.client_id = client_id;
    }
    if let Some(user_id) = payload.user_id {
        ensure_user_exists(&state.pool, user_id).await?;
        shift.user_id = user_id;
    }
    if let Some(starts_at) = payload.starts_at {
        shift.starts_at = starts_at;
    }
    if let Some(ends_at) = payload.ends_at {
        shift.ends_at = ends_at;
    }
    if payload.location.is_some() {
        shift.location = payload.location;
    }
    if payload.notes.is_some() {
        shift.notes = payload.notes;
    }
    if let Some(status) = payload.status {
        shift.status = status;
    }

    // Validate the merged window, not the raw input.
    ensure_window(shift.starts_at, shift.ends_at)?;

    let now = utc_now();
    sqlx::query(
        "UPDATE shifts SET client_id = ?, user_id = ?, starts_at = ?, ends_at = ?, location = ?, notes = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(shift.client_id)
    .bind(shift.user_id)
    .bind(shift.starts_at)
    .bind(shift.ends_at)
    .bind(&shift.location)
    .bind(&shift.notes)
    .bind(shift.status)
    .bind(now)
    .bind(id)
    .execute(&state.pool)
    .await?;

    let shift = fetch_shift(&state.pool, id).await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id),
        &shift,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(shift))
}
