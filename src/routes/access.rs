//! Access management endpoints: role assignment, permission overrides,
//! and account approval. Everything here is gated by
//! `settings.access.manage` and logged with Critical severity.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{load_principal, permissions, roles};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::rbac::{
    AccessIndexResponse, AccessUpdateRequest, AccessUser, ApproveUserRequest, OverrideMode,
    Permission, Role,
};
use crate::models::user::{DbUser, User};
use crate::routes::auth::fetch_user_by_id;
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/settings/access",
    tag = "Access",
    responses(
        (status = 200, description = "Users with roles, overrides, and catalogs", body = AccessIndexResponse),
        (status = 403, description = "Missing settings.access.manage"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn index(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<AccessIndexResponse>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::SETTINGS_ACCESS_MANAGE)?;

    let users = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, role, provider, provider_id, approved_at, approved_by, created_at, updated_at, deleted_at FROM users WHERE deleted_at IS NULL ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut access_users = Vec::with_capacity(users.len());
    for user in users {
        access_users.push(load_access_user_row(&state.pool, user).await?);
    }

    let roles = sqlx::query_as::<_, Role>(
        "SELECT id, name, label, created_at, updated_at FROM roles ORDER BY label",
    )
    .fetch_all(&state.pool)
    .await?;

    let permissions = sqlx::query_as::<_, Permission>(
        "SELECT id, key, description, created_at, updated_at FROM permissions ORDER BY key",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(AccessIndexResponse {
        users: access_users,
        roles,
        permissions,
    }))
}

#[utoipa::path(
    put,
    path = "/settings/access/users/{user_id}",
    tag = "Access",
    params(("user_id" = Uuid, Path, description = "Target user")),
    request_body = AccessUpdateRequest,
    responses(
        (status = 200, description = "Access updated", body = AccessUser),
        (status = 403, description = "Missing settings.access.manage"),
        (status = 404, description = "User, role, or permission not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user_access(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AccessUpdateRequest>,
) -> AppResult<Json<AccessUser>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::SETTINGS_ACCESS_MANAGE)?;

    let target = fetch_user_by_id(&state.pool, user_id).await?;

    let mut tx = state.pool.begin().await?;
    apply_access_changes(&mut tx, &target, &req.role_ids, &req.overrides).await?;
    tx.commit().await?;

    let row = fetch_user_by_id(&state.pool, user_id).await?;
    let updated: User = row.clone().try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "access_updated",
        Some(auth.user_id),
        &updated,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(load_access_user_row(&state.pool, row).await?))
}

#[utoipa::path(
    post,
    path = "/settings/access/users/{user_id}/approve",
    tag = "Access",
    params(("user_id" = Uuid, Path, description = "Target user")),
    request_body = ApproveUserRequest,
    responses(
        (status = 200, description = "User approved", body = AccessUser),
        (status = 403, description = "Missing settings.access.manage"),
        (status = 422, description = "At least one role is required"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn approve_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ApproveUserRequest>,
) -> AppResult<Json<AccessUser>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::SETTINGS_ACCESS_MANAGE)?;

    // An approved account with zero roles would still resolve every
    // permission to deny; approval and role assignment travel together.
    if req.role_ids.is_empty() {
        return Err(AppError::validation("at least one role is required to approve a user"));
    }

    let target = fetch_user_by_id(&state.pool, user_id).await?;

    let mut tx = state.pool.begin().await?;
    apply_access_changes(&mut tx, &target, &req.role_ids, &req.overrides).await?;

    // Idempotent: repeated approval keeps the original stamp.
    let now = utc_now();
    sqlx::query(
        "UPDATE users SET approved_at = COALESCE(approved_at, ?), approved_by = COALESCE(approved_by, ?), updated_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(auth.user_id)
    .bind(now)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let row = fetch_user_by_id(&state.pool, user_id).await?;
    let updated: User = row.clone().try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "account_approved",
        Some(auth.user_id),
        &updated,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(load_access_user_row(&state.pool, row).await?))
}

/// Replace the target's role set, refresh the legacy label cache, and
/// upsert/delete overrides, all within the caller's transaction.
pub(crate) async fn apply_access_changes(
    tx: &mut Transaction<'_, Sqlite>,
    target: &DbUser,
    role_ids: &[Uuid],
    overrides: &HashMap<Uuid, OverrideMode>,
) -> AppResult<()> {
    let now = utc_now();

    // Resolve every submitted role up front; a bad id aborts the whole
    // change rather than leaving a partial role set behind.
    let mut role_names = Vec::with_capacity(role_ids.len());
    for role_id in role_ids {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM roles WHERE id = ?")
            .bind(role_id)
            .fetch_optional(&mut **tx)
            .await?;
        role_names.push(name.ok_or_else(|| AppError::not_found("role not found"))?);
    }

    // Atomic replace of the association set, not incremental add/remove.
    sqlx::query("DELETE FROM role_user WHERE user_id = ?")
        .bind(target.id)
        .execute(&mut **tx)
        .await?;

    for role_id in role_ids {
        sqlx::query("INSERT INTO role_user (user_id, role_id, created_at) VALUES (?, ?, ?)")
            .bind(target.id)
            .bind(role_id)
            .bind(now)
            .execute(&mut **tx)
            .await?;
    }

    // Legacy users.role stays in sync as a denormalized cache; some older
    // screens still display it. resolve() never reads it.
    let legacy_label = role_names
        .first()
        .cloned()
        .or_else(|| target.role.clone())
        .unwrap_or_else(|| roles::SUPPORT_WORKER.to_string());

    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(&legacy_label)
        .bind(now)
        .bind(target.id)
        .execute(&mut **tx)
        .await?;

    // Overrides: inherit deletes the row, allow/deny upserts it. The
    // primary key on (user_id, permission_id) guarantees a single row
    // per pair survives concurrent edits.
    for (permission_id, mode) in overrides {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM permissions WHERE id = ?)")
            .bind(permission_id)
            .fetch_one(&mut **tx)
            .await?;
        if !exists {
            return Err(AppError::not_found("permission not found"));
        }

        match mode {
            OverrideMode::Inherit => {
                sqlx::query("DELETE FROM permission_user WHERE user_id = ? AND permission_id = ?")
                    .bind(target.id)
                    .bind(permission_id)
                    .execute(&mut **tx)
                    .await?;
            }
            OverrideMode::Allow | OverrideMode::Deny => {
                let allowed = *mode == OverrideMode::Allow;
                sqlx::query(
                    r#"
                    INSERT INTO permission_user (user_id, permission_id, allowed, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT (user_id, permission_id)
                    DO UPDATE SET allowed = excluded.allowed, updated_at = excluded.updated_at
                    "#,
                )
                .bind(target.id)
                .bind(permission_id)
                .bind(allowed)
                .bind(now)
                .bind(now)
                .execute(&mut **tx)
                .await?;
            }
        }
    }

    Ok(())
}

async fn load_access_user_row(pool: &SqlitePool, user: DbUser) -> AppResult<AccessUser> {
    let user_roles = sqlx::query_as::<_, Role>(
        r#"
        SELECT r.id, r.name, r.label, r.created_at, r.updated_at
        FROM roles r
        INNER JOIN role_user ru ON r.id = ru.role_id
        WHERE ru.user_id = ?
        ORDER BY r.name
        "#,
    )
    .bind(user.id)
    .fetch_all(pool)
    .await?;

    let overrides: Vec<(Uuid, bool)> = sqlx::query_as(
        "SELECT permission_id, allowed FROM permission_user WHERE user_id = ?",
    )
    .bind(user.id)
    .fetch_all(pool)
    .await?;

    Ok(AccessUser {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        approved_at: user.approved_at,
        roles: user_roles,
        overrides: overrides.into_iter().collect(),
    })
}
