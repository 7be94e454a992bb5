use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{load_principal, permissions, roles, Principal, Scope, ScopeResource};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::client::{
    AssignWorkersRequest, Client, ClientCreateRequest, ClientDetail, ClientStatus,
    ClientUpdateRequest, SupportWorker,
};
use crate::utils::utc_now;

const CLIENT_COLUMNS: &str = "id, first_name, last_name, status, user_id, created_at, updated_at";

#[utoipa::path(
    get,
    path = "/clients",
    tag = "Clients",
    responses(
        (status = 200, description = "Clients visible to the caller", body = [Client]),
        (status = 403, description = "Missing clients.viewAny"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_clients(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Client>>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::CLIENTS_VIEW_ANY)?;

    let clients = match principal.scope_for(ScopeResource::Clients) {
        Scope::Global => {
            let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients ORDER BY last_name");
            sqlx::query_as::<_, Client>(&sql).fetch_all(&state.pool).await?
        }
        Scope::Owned => {
            // Support workers see only clients they are assigned to.
            sqlx::query_as::<_, Client>(
                r#"
                SELECT c.id, c.first_name, c.last_name, c.status, c.user_id, c.created_at, c.updated_at
                FROM clients c
                INNER JOIN client_user cu ON cu.client_id = c.id
                WHERE cu.user_id = ?
                ORDER BY c.last_name
                "#,
            )
            .bind(principal.user_id)
            .fetch_all(&state.pool)
            .await?
        }
    };

    Ok(Json(clients))
}

#[utoipa::path(
    post,
    path = "/clients",
    tag = "Clients",
    request_body = ClientCreateRequest,
    responses(
        (status = 201, description = "Client created", body = Client),
        (status = 403, description = "Missing clients.create"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_client(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<ClientCreateRequest>,
) -> AppResult<(StatusCode, Json<Client>)> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::CLIENTS_CREATE)?;

    let now = utc_now();
    let client_id = Uuid::new_v4();
    let status = payload.status.unwrap_or(ClientStatus::Active);

    sqlx::query(
        "INSERT INTO clients (id, first_name, last_name, status, user_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(client_id)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(status)
    .bind(payload.user_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let client = fetch_client(&state.pool, client_id).await?;

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &client,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(client)))
}

#[utoipa::path(
    get,
    path = "/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client detail with assigned workers", body = ClientDetail),
        (status = 403, description = "Not assigned to this client"),
        (status = 404, description = "Client not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ClientDetail>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;

    let client = fetch_client(&state.pool, id).await?;
    ensure_client_view(&state.pool, &principal, client.id).await?;

    let support_workers = sqlx::query_as::<_, SupportWorker>(
        r#"
        SELECT u.id, u.name, u.email
        FROM users u
        INNER JOIN client_user cu ON cu.user_id = u.id
        WHERE cu.client_id = ?
        ORDER BY u.name
        "#,
    )
    .bind(client.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(ClientDetail {
        client,
        support_workers,
    }))
}

#[utoipa::path(
    put,
    path = "/clients/{id}",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = ClientUpdateRequest,
    responses(
        (status = 200, description = "Client updated", body = Client),
        (status = 403, description = "Missing clients.update"),
        (status = 404, description = "Client not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_client(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClientUpdateRequest>,
) -> AppResult<Json<Client>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::CLIENTS_UPDATE)?;

    let old = fetch_client(&state.pool, id).await?;

    let mut client = old.clone();
    if let Some(first_name) = payload.first_name {
        client.first_name = first_name;
    }
    if let Some(last_name) = payload.last_name {
        client.last_name = last_name;
    }
    if let Some(status) = payload.status {
        client.status = status;
    }
    if payload.user_id.is_some() {
        client.user_id = payload.user_id;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE clients SET first_name = ?, last_name = ?, status = ?, user_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&client.first_name)
    .bind(&client.last_name)
    .bind(client.status)
    .bind(client.user_id)
    .bind(now)
    .bind(id)
    .execute(&state.pool)
    .await?;

    let client = fetch_client(&state.pool, id).await?;

    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id),
        &client,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(client))
}

#[utoipa::path(
    put,
    path = "/clients/{id}/assignments",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = AssignWorkersRequest,
    responses(
        (status = 200, description = "Assignments replaced", body = [SupportWorker]),
        (status = 403, description = "Missing clients.assignments.update"),
        (status = 404, description = "Client not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_assignments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignWorkersRequest>,
) -> AppResult<Json<Vec<SupportWorker>>> {
    let principal = load_principal(&state.pool, auth.user_id).await?;
    principal.require(permissions::CLIENTS_ASSIGNMENTS_UPDATE)?;

    let client = fetch_client(&state.pool, id).await?;

    // Only support workers can be assigned; other submitted ids are
    // dropped rather than failing the whole call.
    let mut allowed_ids = Vec::with_capacity(payload.user_ids.len());
    for user_id in &payload.user_ids {
        let is_worker: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM role_user ru
                INNER JOIN roles r ON r.id = ru.role_id
                WHERE ru.user_id = ? AND r.name = ?
            )
            "#,
        )
        .bind(user_id)
        .bind(roles::SUPPORT_WORKER)
        .fetch_one(&state.pool)
        .await?;
        if is_worker {
            allowed_ids.push(*user_id);
        }
    }

    let now = utc_now();
    let mut tx = state.pool.begin().await?;
    sqlx::query("DELETE FROM client_user WHERE client_id = ?")
        .bind(client.id)
        .execute(&mut *tx)
        .await?;
    for user_id in &allowed_ids {
        sqlx::query("INSERT INTO client_user (client_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(client.id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let support_workers = sqlx::query_as::<_, SupportWorker>(
        r#"
        SELECT u.id, u.name, u.email
        FROM users u
        INNER JOIN client_user cu ON cu.user_id = u.id
        WHERE cu.client_id = ?
        ORDER BY u.name
        "#,
    )
    .bind(client.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(support_workers))
}

/// Single-record visibility: global viewers see any client; support
/// workers only the ones they are assigned to.
async fn ensure_client_view(
    pool: &SqlitePool,
    principal: &Principal,
    client_id: Uuid,
) -> AppResult<()> {
    if principal.can(permissions::CLIENTS_VIEW_ANY) && !principal.has_role(roles::SUPPORT_WORKER) {
        return Ok(());
    }

    if principal.has_role(roles::SUPPORT_WORKER) {
        let assigned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM client_user WHERE client_id = ? AND user_id = ?)",
        )
        .bind(client_id)
        .bind(principal.user_id)
        .fetch_one(pool)
        .await?;
        if assigned {
            return Ok(());
        }
    }

    Err(AppError::forbidden("not assigned to this client"))
}

async fn fetch_client(pool: &SqlitePool, client_id: Uuid) -> AppResult<Client> {
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?");
    sqlx::query_as::<_, Client>(&sql)
        .bind(client_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("client not found"))
}
