use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Duration;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{load_principal, permissions};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::client::{AssignClientsRequest, Client};
use crate::models::shift::Shift;
use crate::models::user::{DbUser, StaffDetail, StaffProfile, StaffUpdateRequest, User};
use crate::routes::access::apply_access_changes;
use crate::routes::auth::fetch_user_by_id;
use crate::utils::utc_now;

#[derive(Debug, Deserialize)]
pub struct StaffListQuery {
    pub q: Option<String>,
}

#[utoipa::path(
    get,
    path = "/staff",
    tag = "Staff",
    params(("q" = Option<String>, Query, description = "Name or email search")),
    responses(
        (status = 200, description = "Staff users", body = [User]),
        (status = 403, description = "Missing staff.viewAny"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_staff(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<StaffListQuery>,
) -> AppResult<Json<Vec<User>>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::STAFF_VIEW_ANY)?;

    let search = query.q.unwrap_or_default().trim().to_string();

    let users = if search.is_empty() {
        sqlx::query_as::<_, DbUser>(
            "SELECT id, name, email, password_hash, role, provider, provider_id, approved_at, approved_by, created_at, updated_at, deleted_at FROM users WHERE deleted_at IS NULL ORDER BY name",
        )
        .fetch_all(&state.pool)
        .await?
    } else {
        let pattern = format!("%{search}%");
        sqlx::query_as::<_, DbUser>(
            "SELECT id, name, email, password_hash, role, provider, provider_id, approved_at, approved_by, created_at, updated_at, deleted_at FROM users WHERE deleted_at IS NULL AND (name LIKE ? OR email LIKE ?) ORDER BY name",
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&state.pool)
        .await?
    };

    let users: Vec<User> = users
        .into_iter()
        .map(User::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/staff/{id}",
    tag = "Staff",
    params(("id" = Uuid, Path, description = "Staff user id")),
    responses(
        (status = 200, description = "Staff detail with today's shifts", body = StaffDetail),
        (status = 403, description = "Not self and missing staff.viewAny"),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_staff(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<StaffDetail>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;

    // Staff can view themselves; managers/admins can view anyone.
    if principal.user_id != id {
        principal.require(permissions::STAFF_VIEW_ANY)?;
    }

    let user: User = fetch_user_by_id(&state.pool, id).await?.try_into()?;
    let profile = fetch_profile(&state.pool, id).await?;

    let today = utc_now().date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    let tomorrow = today + Duration::days(1);

    let today_shifts = sqlx::query_as::<_, Shift>(
        "SELECT id, client_id, user_id, starts_at, ends_at, location, notes, status, created_by, created_at, updated_at FROM shifts WHERE user_id = ? AND starts_at >= ? AND starts_at < ? ORDER BY starts_at",
    )
    .bind(id)
    .bind(today)
    .bind(tomorrow)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(StaffDetail {
        user,
        profile,
        today_shifts,
    }))
}

#[utoipa::path(
    put,
    path = "/staff/{id}",
    tag = "Staff",
    params(("id" = Uuid, Path, description = "Staff user id")),
    request_body = StaffUpdateRequest,
    responses(
        (status = 200, description = "Staff updated", body = StaffDetail),
        (status = 403, description = "Missing staff.update"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already in use"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_staff(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<StaffUpdateRequest>,
) -> AppResult<Json<StaffDetail>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::STAFF_UPDATE)?;

    let target = fetch_user_by_id(&state.pool, id).await?;

    let email = payload.email.trim().to_lowercase();
    if email != target.email {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? AND id != ? AND deleted_at IS NULL)",
        )
        .bind(&email)
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
        if taken {
            return Err(AppError::conflict("email already in use"));
        }
    }

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE users SET name = ?, email = ?, updated_at = ? WHERE id = ?")
        .bind(&payload.name)
        .bind(&email)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    // Optional role sync; reuses the access-change path so the legacy
    // label cache stays consistent.
    if let Some(role_ids) = &payload.role_ids {
        apply_access_changes(&mut tx, &target, role_ids, &Default::default()).await?;
    }

    if let Some(profile) = &payload.profile {
        sqlx::query(
            r#"
            INSERT INTO staff_profiles (user_id, phone, job_title, employment_type, start_date, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id)
            DO UPDATE SET phone = excluded.phone, job_title = excluded.job_title,
                          employment_type = excluded.employment_type, start_date = excluded.start_date,
                          is_active = excluded.is_active, updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(&profile.phone)
        .bind(&profile.job_title)
        .bind(&profile.employment_type)
        .bind(profile.start_date)
        .bind(profile.is_active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let user: User = fetch_user_by_id(&state.pool, id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    let profile = fetch_profile(&state.pool, id).await?;

    Ok(Json(StaffDetail {
        user,
        profile,
        today_shifts: Vec::new(),
    }))
}

#[utoipa::path(
    put,
    path = "/staff/{id}/assignments",
    operation_id = "staff_update_assignments",
    tag = "Staff",
    params(("id" = Uuid, Path, description = "Staff user id")),
    request_body = AssignClientsRequest,
    responses(
        (status = 200, description = "Assignments replaced", body = [Client]),
        (status = 403, description = "Missing staff.assignments.update"),
        (status = 404, description = "User or client not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_assignments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignClientsRequest>,
) -> AppResult<Json<Vec<Client>>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::STAFF_ASSIGNMENTS_UPDATE)?;

    let target = fetch_user_by_id(&state.pool, id).await?;

    for client_id in &payload.client_ids {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clients WHERE id = ?)")
            .bind(client_id)
            .fetch_one(&state.pool)
            .await?;
        if !exists {
            return Err(AppError::not_found("client not found"));
        }
    }

    let now = utc_now();
    let mut tx = state.pool.begin().await?;
    sqlx::query("DELETE FROM client_user WHERE user_id = ?")
        .bind(target.id)
        .execute(&mut *tx)
        .await?;
    for client_id in &payload.client_ids {
        sqlx::query("INSERT INTO client_user (client_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(client_id)
            .bind(target.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let assigned = sqlx::query_as::<_, Client>(
        r#"
        SELECT c.id, c.first_name, c.last_name, c.status, c.user_id, c.created_at, c.updated_at
        FROM clients c
        INNER JOIN client_user cu ON cu.client_id = c.id
        WHERE cu.user_id = ?
        ORDER BY c.last_name
        "#,
    )
    .bind(target.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(assigned))
}

async fn fetch_profile(pool: &SqlitePool, user_id: Uuid) -> AppResult<Option<StaffProfile>> {
    let profile = sqlx::query_as::<_, StaffProfile>(
        "SELECT user_id, phone, job_title, employment_type, start_date, is_active, created_at, updated_at FROM staff_profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}
