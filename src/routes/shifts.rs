use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{load_principal, permissions, Principal, Scope, ScopeResource};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::shift::{Shift, ShiftCreateRequest, ShiftStatus, ShiftUpdateRequest};
use crate::utils::utc_now;

const SHIFT_COLUMNS: &str = "id, client_id, user_id, starts_at, ends_at, location, notes, status, created_by, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ShiftListQuery {
    pub date: Option<NaiveDate>,
}

#[utoipa::path(
    get,
    path = "/shifts",
    tag = "Shifts",
    params(("date" = Option<String>, Query, description = "Day to list, defaults to today")),
    responses(
        (status = 200, description = "Shifts for the day", body = [Shift]),
        (status = 403, description = "Missing shifts.viewAny"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_shifts(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ShiftListQuery>,
) -> AppResult<Json<Vec<Shift>>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::SHIFTS_VIEW_ANY)?;

    let day = query.date.unwrap_or_else(|| utc_now().date_naive());
    let window_start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    let window_end = window_start + Duration::days(1);

    let mut sql = format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts WHERE starts_at >= ? AND starts_at < ?"
    );
    let owned = principal.scope_for(ScopeResource::Shifts) == Scope::Owned;
    if owned {
        sql.push_str(" AND user_id = ?");
    }
    sql.push_str(" ORDER BY starts_at");

    let mut q = sqlx::query_as::<_, Shift>(&sql).bind(window_start).bind(window_end);
    if owned {
        q = q.bind(principal.user_id);
    }

    let shifts = q.fetch_all(&state.pool).await?;
    Ok(Json(shifts))
}

#[utoipa::path(
    post,
    path = "/shifts",
    tag = "Shifts",
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
    get,
    path = "/shifts/{id}",
    tag = "Shifts",
    params(("id" = Uuid, Path, description = "Shift id")),
    responses(
        (status = 200, description = "Shift detail", body = Shift),
        (status = 403, description = "Not the assigned staff member"),
        (status = 404, description = "Shift not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_shift(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Shift>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::SHIFTS_VIEW_ANY)?;

    let shift = fetch_shift(&state.pool, id).await?;
    ensure_shift_access(&principal, &shift)?;

    Ok(Json(shift))
}

#[utoipa::path(
    put,
    path = "/shifts/{id}",
    tag = "Shifts",
    params(("id" = Uuid, Path, description = "Shift id")),
    request_body = ShiftUpdateRequest,
    responses(
        (status = 200, description = "Shift updated", body = Shift),
        (status = 403, description = "Not the assigned staff member"),
        (status = 404, description = "Shift not found"),
        (status = 422, description = "ends_at must be after starts_at"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_shift(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShiftUpdateRequest>,
) -> AppResult<Json<Shift>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::SHIFTS_UPDATE)?;

    let old = fetch_shift(&state.pool, id).await?;
    ensure_shift_access(&principal, &old)?;
    ensure_window(payload.starts_at, payload.ends_at)?;

    ensure_client_exists(&state.pool, payload.client_id).await?;
    ensure_user_exists(&state.pool, payload.user_id).await?;

    let now = utc_now();
    let status = payload.status.unwrap_or(old.status);

    sqlx::query(
        "UPDATE shifts SET client_id = ?, user_id = ?, starts_at = ?, ends_at = ?, location = ?, notes = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(payload.client_id)
    .bind(payload.user_id)
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .bind(&payload.location)
    .bind(&payload.notes)
    .bind(status)
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

/// Insert a new shift after window validation; shared with the calendar
/// create endpoint.
pub(crate) async fn insert_shift(
    state: &AppState,
    principal: &Principal,
    payload: ShiftCreateRequest,
) -> AppResult<Shift> {
    ensure_window(payload.starts_at, payload.ends_at)?;
    ensure_client_exists(&state.pool, payload.client_id).await?;
    ensure_user_exists(&state.pool, payload.user_id).await?;

    let now = utc_now();
    let shift_id = Uuid::new_v4();
    let status = payload.status.unwrap_or(ShiftStatus::Scheduled);

    sqlx::query(
        "INSERT INTO shifts (id, client_id, user_id, starts_at, ends_at, location, notes, status, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(shift_id)
    .bind(payload.client_id)
    .bind(payload.user_id)
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .bind(&payload.location)
    .bind(&payload.notes)
    .bind(status)
    .bind(principal.user_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    fetch_shift(&state.pool, shift_id).await
}

/// Every stored state must satisfy `ends_at > starts_at`, strictly.
pub(crate) fn ensure_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> AppResult<()> {
    if ends_at <= starts_at {
        return Err(AppError::validation("ends_at must be after starts_at"));
    }
    Ok(())
}

/// Staff may touch only their own shifts unless they hold manageAny.
pub(crate) fn ensure_shift_access(principal: &Principal, shift: &Shift) -> AppResult<()> {
    if principal.can(permissions::SHIFTS_MANAGE_ANY) || shift.user_id == principal.user_id {
        Ok(())
    } else {
        Err(AppError::forbidden("not your shift"))
    }
}

pub(crate) async fn fetch_shift(pool: &SqlitePool, shift_id: Uuid) -> AppResult<Shift> {
    let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?");
    sqlx::query_as::<_, Shift>(&sql)
        .bind(shift_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("shift not found"))
}

pub(crate) async fn ensure_client_exists(pool: &SqlitePool, client_id: Uuid) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clients WHERE id = ?)")
        .bind(client_id)
        .fetch_one(pool)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::not_found("client not found"))
    }
}

pub(crate) async fn ensure_user_exists(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ? AND deleted_at IS NULL)",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::not_found("user not found"))
    }
}
