use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::user::{
    AuthResponse, DbUser, LoginRequest, RegisterRequest, SsoCallbackRequest, User,
};
use crate::utils::{hash_password, hash_random_password, utc_now, verify_password};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered, pending approval", body = MessageResponse),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let email = payload.email.trim().to_lowercase();
    ensure_email_available(&state.pool, &email).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, provider, provider_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&payload.name)
    .bind(&email)
    .bind(password_hash)
    .bind(Option::<String>::None)
    .bind("local")
    .bind(Option::<String>::None)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let db_user = fetch_user_by_id(&state.pool, user_id).await?;
    let user: User = db_user.try_into()?;
    log_activity(&state.event_bus, "registered", Some(user.id), &user);

    // Accounts start pending; no token is issued until an admin approves.
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Registration successful. Awaiting approval.".to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account awaiting approval")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = payload.email.trim().to_lowercase();

    let db_user = fetch_user_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    let password_ok = verify_password(&payload.password, &db_user.password_hash)?;
    if !password_ok {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    issue_token(&state, db_user)
}

#[utoipa::path(
    post,
    path = "/auth/sso/callback",
    tag = "Auth",
    request_body = SsoCallbackRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 403, description = "Account awaiting approval")
    )
)]
pub async fn sso_callback(
    State(state): State<AppState>,
    Json(payload): Json<SsoCallbackRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::unauthorized("no email returned from identity provider"));
    }

    let existing = fetch_user_by_email(&state.pool, &email).await?;

    let db_user = match existing {
        Some(user) => user,
        None => {
            // First sign-in through this provider: create the account in the
            // pending state with no roles. Approval happens out of band.
            let name = payload
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());
            let now = utc_now();
            let user_id = Uuid::new_v4();

            sqlx::query(
                "INSERT INTO users (id, name, email, password_hash, role, provider, provider_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(&name)
            .bind(&email)
            .bind(hash_random_password()?)
            .bind(Option::<String>::None)
            .bind(&payload.provider)
            .bind(&payload.provider_id)
            .bind(now)
            .bind(now)
            .execute(&state.pool)
            .await?;

            let db_user = fetch_user_by_id(&state.pool, user_id).await?;
            let user: User = db_user.clone().try_into()?;
            log_activity(&state.event_bus, "registered", Some(user.id), &user);
            db_user
        }
    };

    issue_token(&state, db_user)
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let db_user = fetch_user_by_id(&state.pool, auth.user_id).await?;
    let user: User = db_user.try_into()?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged")),
    security(("bearerAuth" = []))
)]
pub async fn logout(_auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// Account approval gate. Runs after credentials resolve to a user on
/// every entry point; a pending account never receives a token.
fn issue_token(state: &AppState, db_user: DbUser) -> AppResult<Json<AuthResponse>> {
    if db_user.approved_at.is_none() {
        return Err(AppError::Unapproved);
    }

    let token = state.jwt.encode(db_user.id)?;
    let user: User = db_user.try_into()?;

    Ok(Json(AuthResponse { token, user }))
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND deleted_at IS NULL")
            .bind(email)
            .fetch_one(pool)
            .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

async fn fetch_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, role, provider, provider_id, approved_at, approved_by, created_at, updated_at, deleted_at FROM users WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub(crate) async fn fetch_user_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, password_hash, role, provider, provider_id, approved_at, approved_by, created_at, updated_at, deleted_at FROM users WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("user not found"))
}
