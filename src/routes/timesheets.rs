use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{load_principal, permissions, Principal, Scope, ScopeResource};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::timesheet::{
    Timesheet, TimesheetCreateRequest, TimesheetListQuery, TimesheetStatus, TimesheetUpdateRequest,
};
use crate::routes::shifts::{ensure_client_exists, ensure_window, fetch_shift};
use crate::utils::utc_now;

const TIMESHEET_COLUMNS: &str = "id, user_id, client_id, shift_id, work_date, starts_at, ends_at, break_minutes, notes, status, created_by, approved_by, approved_at, created_at, updated_at";

const MAX_BREAK_MINUTES: i64 = 600;

#[utoipa::path(
    get,
    path = "/timesheets",
    tag = "Timesheets",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("from" = Option<String>, Query, description = "Earliest work date"),
        ("to" = Option<String>, Query, description = "Latest work date"),
    ),
    responses(
        (status = 200, description = "Timesheets visible to the caller", body = [Timesheet]),
        (status = 403, description = "Missing timesheets.viewAny"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_timesheets(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TimesheetListQuery>,
) -> AppResult<Json<Vec<Timesheet>>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::TIMESHEETS_VIEW_ANY)?;

    let mut sql = format!("SELECT {TIMESHEET_COLUMNS} FROM timesheets WHERE 1 = 1");

    // Scope first; the remaining filters only narrow within it.
    let owned = principal.scope_for(ScopeResource::Timesheets) == Scope::Owned;
    if owned {
        sql.push_str(" AND user_id = ?");
    }
    if query.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if query.from.is_some() {
        sql.push_str(" AND work_date >= ?");
    }
    if query.to.is_some() {
        sql.push_str(" AND work_date <= ?");
    }
    sql.push_str(" ORDER BY work_date DESC");

    let mut q = sqlx::query_as::<_, Timesheet>(&sql);
    if owned {
        q = q.bind(principal.user_id);
    }
    if let Some(status) = query.status {
        q = q.bind(status);
    }
    if let Some(from) = query.from {
        q = q.bind(from);
    }
    if let Some(to) = query.to {
        q = q.bind(to);
    }

    let timesheets = q.fetch_all(&state.pool).await?;
    Ok(Json(timesheets))
}

#[utoipa::path(
    post,
    path = "/timesheets",
    tag = "Timesheets",
    request_body = TimesheetCreateRequest,
    responses(
        (status = 201, description = "Timesheet created", body = Timesheet),
        (status = 403, description = "Missing timesheets.create or foreign shift"),
        (status = 422, description = "Invalid window, break, or status"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_timesheet(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<TimesheetCreateRequest>,
) -> AppResult<(StatusCode, Json<Timesheet>)> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::TIMESHEETS_CREATE)?;

    ensure_window(payload.starts_at, payload.ends_at)?;
    let break_minutes = payload.break_minutes.unwrap_or(0);
    ensure_break(break_minutes)?;

    let status = payload.status.unwrap_or(TimesheetStatus::Draft);
    if !matches!(status, TimesheetStatus::Draft | TimesheetStatus::Submitted) {
        return Err(AppError::validation("status must be draft or submitted"));
    }

    ensure_client_exists(&state.pool, payload.client_id).await?;

    // Seeding from a shift transfers ownership to the shift's assigned
    // staff member; the creator must manage-any or be that same person.
    let mut owner_id = principal.user_id;
    if let Some(shift_id) = payload.shift_id {
        let shift = fetch_shift(&state.pool, shift_id).await?;
        if !principal.can(permissions::TIMESHEETS_MANAGE_ANY) && shift.user_id != principal.user_id {
            return Err(AppError::forbidden("not your shift"));
        }
        owner_id = shift.user_id;
    }

    let now = utc_now();
    let timesheet_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO timesheets (id, user_id, client_id, shift_id, work_date, starts_at, ends_at, break_minutes, notes, status, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(timesheet_id)
    .bind(owner_id)
    .bind(payload.client_id)
    .bind(payload.shift_id)
    .bind(payload.work_date)
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .bind(break_minutes)
    .bind(&payload.notes)
    .bind(status)
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let timesheet = fetch_timesheet(&state.pool, timesheet_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &timesheet,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(timesheet)))
}

#[utoipa::path(
    get,
    path = "/timesheets/{id}",
    tag = "Timesheets",
    params(("id" = Uuid, Path, description = "Timesheet id")),
    responses(
        (status = 200, description = "Timesheet detail", body = Timesheet),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Timesheet not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_timesheet(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Timesheet>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::TIMESHEETS_VIEW_ANY)?;

    let timesheet = fetch_timesheet(&state.pool, id).await?;
    ensure_timesheet_access(&principal, &timesheet)?;

    Ok(Json(timesheet))
}

#[utoipa::path(
    put,
    path = "/timesheets/{id}",
    tag = "Timesheets",
    params(("id" = Uuid, Path, description = "Timesheet id")),
    request_body = TimesheetUpdateRequest,
    responses(
        (status = 200, description = "Timesheet updated", body = Timesheet),
        (status = 403, description = "Not the owner, frozen record, or missing approval rights"),
        (status = 404, description = "Timesheet not found"),
        (status = 422, description = "Invalid window, status, or decision flags"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_timesheet(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<TimesheetUpdateRequest>,
) -> AppResult<Json<Timesheet>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::TIMESHEETS_UPDATE)?;

    let old = fetch_timesheet(&state.pool, id).await?;
    ensure_timesheet_access(&principal, &old)?;

    // Once approved, the record is frozen for everyone but manage-any.
    if old.status == TimesheetStatus::Approved
        && !principal.can(permissions::TIMESHEETS_MANAGE_ANY)
    {
        return Err(AppError::forbidden("approved timesheet can only be changed by a manager"));
    }

    if payload.approve || payload.reject {
        return decide_timesheet(&state, &principal, &headers, old, &payload).await;
    }

    // Normal field path. Merge into the stored record and validate the
    // final values, not the raw input.
    let mut timesheet = old.clone();
    if let Some(client_id) = payload.client_id {
        ensure_client_exists(&state.pool, client_id).await?;
        timesheet.client_id = client_id;
    }
    if let Some(work_date) = payload.work_date {
        timesheet.work_date = work_date;
    }
    if let Some(starts_at) = payload.starts_at {
        timesheet.starts_at = starts_at;
    }
    if let Some(ends_at) = payload.ends_at {
        timesheet.ends_at = ends_at;
    }
    if let Some(break_minutes) = payload.break_minutes {
        ensure_break(break_minutes)?;
        timesheet.break_minutes = break_minutes;
    }
    if payload.notes.is_some() {
        timesheet.notes = payload.notes.clone();
    }
    if let Some(status) = payload.status {
        // approved/rejected are minted only by the decision path
        if !matches!(status, TimesheetStatus::Draft | TimesheetStatus::Submitted) {
            return Err(AppError::validation("status must be draft or submitted"));
        }
        timesheet.status = status;
    }

    ensure_window(timesheet.starts_at, timesheet.ends_at)?;

    let now = utc_now();
    sqlx::query(
        "UPDATE timesheets SET client_id = ?, work_date = ?, starts_at = ?, ends_at = ?, break_minutes = ?, notes = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(timesheet.client_id)
    .bind(timesheet.work_date)
    .bind(timesheet.starts_at)
    .bind(timesheet.ends_at)
    .bind(timesheet.break_minutes)
    .bind(&timesheet.notes)
    .bind(timesheet.status)
    .bind(now)
    .bind(id)
    .execute(&state.pool)
    .await?;

    let timesheet = fetch_timesheet(&state.pool, id).await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id),
        &timesheet,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(timesheet))
}

/// Approve or reject. Disjoint from the field path: the decision stamps
/// status and approver only, ignoring any field edits in the request.
async fn decide_timesheet(
    state: &AppState,
    principal: &Principal,
    headers: &HeaderMap,
    old: Timesheet,
    payload: &TimesheetUpdateRequest,
) -> AppResult<Json<Timesheet>> {
    if payload.approve && payload.reject {
        return Err(AppError::validation("approve and reject are mutually exclusive"));
    }

    if !principal.can(permissions::TIMESHEETS_APPROVE)
        && !principal.can(permissions::TIMESHEETS_MANAGE_ANY)
    {
        return Err(AppError::forbidden("missing permission timesheets.approve"));
    }

    let status = if payload.approve {
        TimesheetStatus::Approved
    } else {
        TimesheetStatus::Rejected
    };

    let now = utc_now();
    sqlx::query(
        "UPDATE timesheets SET status = ?, approved_by = ?, approved_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(status)
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .bind(old.id)
    .execute(&state.pool)
    .await?;

    let timesheet = fetch_timesheet(&state.pool, old.id).await?;

    let action = if payload.approve { "approved" } else { "rejected" };
    log_activity_with_context(
        &state.event_bus,
        action,
        Some(principal.user_id),
        &timesheet,
        Some(&old),
        Some(RequestContext::from_headers(headers)),
    );

    Ok(Json(timesheet))
}

fn ensure_break(break_minutes: i64) -> AppResult<()> {
    if !(0..=MAX_BREAK_MINUTES).contains(&break_minutes) {
        return Err(AppError::validation(format!(
            "break_minutes must be between 0 and {MAX_BREAK_MINUTES}"
        )));
    }
    Ok(())
}

/// Owners may touch only their own records unless they hold manageAny.
/// Ownership is the logged-against staff member, not the creator.
fn ensure_timesheet_access(principal: &Principal, timesheet: &Timesheet) -> AppResult<()> {
    if principal.can(permissions::TIMESHEETS_MANAGE_ANY) || timesheet.user_id == principal.user_id {
        Ok(())
    } else {
        Err(AppError::forbidden("not your timesheet"))
    }
}

async fn fetch_timesheet(pool: &SqlitePool, timesheet_id: Uuid) -> AppResult<Timesheet> {
    let sql = format!("SELECT {TIMESHEET_COLUMNS} FROM timesheets WHERE id = ?");
    sqlx::query_as::<_, Timesheet>(&sql)
        .bind(timesheet_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("timesheet not found"))
}
