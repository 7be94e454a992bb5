#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

use care_roster::create_app;
use care_roster::db::seed::seed_rbac;
use care_roster::utils::hash_password;

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

/// Temp-file SQLite database with migrations and the RBAC catalog
/// seeded, wrapped in a ready-to-oneshot router.
pub async fn setup() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    seed_rbac(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok(TestApp {
        app,
        pool,
        _dir: dir,
    })
}

pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password: &str,
    approved: bool,
) -> Result<Uuid> {
    let user_id = Uuid::new_v4();
    let now = Utc::now();
    let approved_at = approved.then_some(now);

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, provider, approved_at, created_at, updated_at) VALUES (?, ?, ?, ?, 'local', ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(email)
    .bind(hash_password(password).map_err(|e| anyhow::anyhow!("{e}"))?)
    .bind(approved_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(user_id)
}

pub async fn assign_role(pool: &SqlitePool, user_id: Uuid, role_name: &str) -> Result<()> {
    let role_id: Uuid = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(role_name)
        .fetch_one(pool)
        .await?;

    sqlx::query("INSERT OR IGNORE INTO role_user (user_id, role_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(role_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(())
}

/// An approved user holding one catalog role, ready to log in.
pub async fn create_member(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    role_name: &str,
) -> Result<Uuid> {
    let user_id = create_user(pool, name, email, "password123", true).await?;
    assign_role(pool, user_id, role_name).await?;
    Ok(user_id)
}

pub async fn permission_id(pool: &SqlitePool, key: &str) -> Result<Uuid> {
    let id: Uuid = sqlx::query_scalar("SELECT id FROM permissions WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

pub async fn role_id(pool: &SqlitePool, name: &str) -> Result<Uuid> {
    let id: Uuid = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// Write an override row directly, bypassing the access API.
pub async fn set_override(
    pool: &SqlitePool,
    user_id: Uuid,
    permission_key: &str,
    allowed: bool,
) -> Result<()> {
    let permission_id = permission_id(pool, permission_key).await?;
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO permission_user (user_id, permission_id, allowed, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (user_id, permission_id)
        DO UPDATE SET allowed = excluded.allowed, updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(permission_id)
    .bind(allowed)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_client(pool: &SqlitePool, first_name: &str, last_name: &str) -> Result<Uuid> {
    let client_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO clients (id, first_name, last_name, status, created_at, updated_at) VALUES (?, ?, ?, 'active', ?, ?)",
    )
    .bind(client_id)
    .bind(first_name)
    .bind(last_name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(client_id)
}

pub async fn assign_client(pool: &SqlitePool, client_id: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO client_user (client_id, user_id, created_at) VALUES (?, ?, ?)")
        .bind(client_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn login(app: &Router, email: &str, password: &str) -> Result<String> {
    let (status, body) = request(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await?;

    if status != StatusCode::OK {
        anyhow::bail!("login failed: {} - {}", status, body);
    }

    body.get("token")
        .and_then(|v| v.as_str())
        .map(String::from)
        .context("missing token")
}

/// Fire one request through the router and return (status, parsed body).
pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    let req = match payload {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    Ok((status, body))
}
