use anyhow::Result;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

mod common;
use common::{create_client, create_member, login, request, setup};

async fn seed_timesheet(app: &axum::Router, token: &str, client_id: Uuid) -> Result<String> {
    let (status, body) = request(
        app,
        "POST",
        "/timesheets",
        Some(token),
        Some(json!({
            "client_id": client_id,
            "work_date": "2026-02-03",
            "starts_at": "2026-02-03T09:00:00Z",
            "ends_at": "2026-02-03T17:00:00Z",
            "break_minutes": 30
        })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "seed timesheet failed: {body}");
    Ok(body["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn ownership_gates_edits_between_workers() -> Result<()> {
    let t = setup().await?;

    let client_id = create_client(&t.pool, "June", "Osei").await?;
    let worker_a = create_member(&t.pool, "Worker A", "a@example.com", "support_worker").await?;
    create_member(&t.pool, "Worker B", "b@example.com", "support_worker").await?;

    let token_a = login(&t.app, "a@example.com", "password123").await?;
    let token_b = login(&t.app, "b@example.com", "password123").await?;

    let id = seed_timesheet(&t.app, &token_a, client_id).await?;

    // A's own record: draft, owned by A, created by A
    let (status, body) = request(&t.app, "GET", &format!("/timesheets/{id}"), Some(&token_a), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "draft");
    assert_eq!(body["user_id"], worker_a.to_string());
    assert_eq!(body["created_by"], worker_a.to_string());

    // Another support worker cannot read or edit it
    let (status, _) = request(&t.app, "GET", &format!("/timesheets/{id}"), Some(&token_b), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&token_b),
        Some(json!({"notes": "tampered"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let notes: Option<String> = sqlx::query_scalar("SELECT notes FROM timesheets WHERE id = ?")
        .bind(Uuid::parse_str(&id)?)
        .fetch_one(&t.pool)
        .await?;
    assert_eq!(notes, None, "forbidden edit must not partially apply");

    Ok(())
}

#[tokio::test]
async fn submit_then_approve_with_proper_permissions() -> Result<()> {
    let t = setup().await?;

    let client_id = create_client(&t.pool, "June", "Osei").await?;
    create_member(&t.pool, "Worker", "worker@example.com", "support_worker").await?;
    let manager = create_member(&t.pool, "Manager", "manager@example.com", "provider_manager").await?;

    let worker_token = login(&t.app, "worker@example.com", "password123").await?;
    let manager_token = login(&t.app, "manager@example.com", "password123").await?;

    let id = seed_timesheet(&t.app, &worker_token, client_id).await?;

    // Owner submits through the normal field path
    let (status, body) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&worker_token),
        Some(json!({"status": "submitted"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "submitted");

    // The field path cannot mint an approval
    let (status, _) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&worker_token),
        Some(json!({"status": "approved"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Approving without approval rights fails and changes nothing
    let (status, _) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&worker_token),
        Some(json!({"approve": true})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let status_now: String = sqlx::query_scalar("SELECT status FROM timesheets WHERE id = ?")
        .bind(Uuid::parse_str(&id)?)
        .fetch_one(&t.pool)
        .await?;
    assert_eq!(status_now, "submitted");

    // Both flags at once is structurally illegal
    let (status, _) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&manager_token),
        Some(json!({"approve": true, "reject": true})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // The decision path stamps approver and ignores field edits
    let (status, body) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&manager_token),
        Some(json!({"approve": true, "notes": "smuggled in"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "approved");
    assert_eq!(body["approved_by"], manager.to_string());
    assert!(body["approved_at"].is_string());
    assert!(body["notes"].is_null(), "decision path must not apply field edits");

    Ok(())
}

#[tokio::test]
async fn approved_records_are_frozen_except_for_managers() -> Result<()> {
    let t = setup().await?;

    let client_id = create_client(&t.pool, "June", "Osei").await?;
    create_member(&t.pool, "Worker", "worker@example.com", "support_worker").await?;
    create_member(&t.pool, "Manager", "manager@example.com", "provider_manager").await?;

    let worker_token = login(&t.app, "worker@example.com", "password123").await?;
    let manager_token = login(&t.app, "manager@example.com", "password123").await?;

    let id = seed_timesheet(&t.app, &worker_token, client_id).await?;

    let (status, _) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&manager_token),
        Some(json!({"approve": true})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // The owner can no longer touch it
    let (status, _) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&worker_token),
        Some(json!({"notes": "late correction"})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // manage-any may still correct the frozen record
    let (status, body) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&manager_token),
        Some(json!({"break_minutes": 45})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["break_minutes"], 45);
    assert_eq!(body["status"], "approved");

    Ok(())
}

#[tokio::test]
async fn rejection_reopens_the_editing_path() -> Result<()> {
    let t = setup().await?;

    let client_id = create_client(&t.pool, "June", "Osei").await?;
    create_member(&t.pool, "Worker", "worker@example.com", "support_worker").await?;
    let manager = create_member(&t.pool, "Manager", "manager@example.com", "provider_manager").await?;

    let worker_token = login(&t.app, "worker@example.com", "password123").await?;
    let manager_token = login(&t.app, "manager@example.com", "password123").await?;

    let id = seed_timesheet(&t.app, &worker_token, client_id).await?;

    let (status, body) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&manager_token),
        Some(json!({"reject": true})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["approved_by"], manager.to_string());

    // A rejected record is not frozen; the owner may fix and resubmit
    let (status, body) = request(
        &t.app,
        "PUT",
        &format!("/timesheets/{id}"),
        Some(&worker_token),
        Some(json!({
            "starts_at": "2026-02-03T09:30:00Z",
            "ends_at": "2026-02-03T17:30:00Z",
            "status": "submitted"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "submitted");

    Ok(())
}

#[tokio::test]
async fn creating_from_a_shift_transfers_ownership() -> Result<()> {
    let t = setup().await?;

    let client_id = create_client(&t.pool, "June", "Osei").await?;
    let worker_a = create_member(&t.pool, "Worker A", "a@example.com", "support_worker").await?;
    create_member(&t.pool, "Worker B", "b@example.com", "support_worker").await?;
    let manager = create_member(&t.pool, "Manager", "manager@example.com", "provider_manager").await?;

    // A shift assigned to worker A
    let shift_id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO shifts (id, client_id, user_id, starts_at, ends_at, status, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, 'scheduled', ?, ?, ?)",
    )
    .bind(shift_id)
    .bind(client_id)
    .bind(worker_a)
    .bind("2026-02-03T09:00:00Z".parse::<chrono::DateTime<Utc>>()?)
    .bind("2026-02-03T17:00:00Z".parse::<chrono::DateTime<Utc>>()?)
    .bind(manager)
    .bind(now)
    .bind(now)
    .execute(&t.pool)
    .await?;

    let payload = json!({
        "client_id": client_id,
        "shift_id": shift_id,
        "work_date": "2026-02-03",
        "starts_at": "2026-02-03T09:00:00Z",
        "ends_at": "2026-02-03T17:00:00Z"
    });

    // Another worker cannot log time against A's shift
    let token_b = login(&t.app, "b@example.com", "password123").await?;
    let (status, _) = request(&t.app, "POST", "/timesheets", Some(&token_b), Some(payload.clone())).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A manager can, and the record lands on the shift's staff member
    let manager_token = login(&t.app, "manager@example.com", "password123").await?;
    let (status, body) = request(&t.app, "POST", "/timesheets", Some(&manager_token), Some(payload)).await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user_id"], worker_a.to_string(), "ownership follows the shift");
    assert_eq!(body["created_by"], manager.to_string());
    assert_eq!(body["shift_id"], shift_id.to_string());

    Ok(())
}

#[tokio::test]
async fn create_validates_window_break_and_status() -> Result<()> {
    let t = setup().await?;

    let client_id = create_client(&t.pool, "June", "Osei").await?;
    create_member(&t.pool, "Worker", "worker@example.com", "support_worker").await?;
    let token = login(&t.app, "worker@example.com", "password123").await?;

    let (status, _) = request(
        &t.app,
        "POST",
        "/timesheets",
        Some(&token),
        Some(json!({
            "client_id": client_id,
            "work_date": "2026-02-03",
            "starts_at": "2026-02-03T17:00:00Z",
            "ends_at": "2026-02-03T09:00:00Z"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "inverted window");

    let (status, _) = request(
        &t.app,
        "POST",
        "/timesheets",
        Some(&token),
        Some(json!({
            "client_id": client_id,
            "work_date": "2026-02-03",
            "starts_at": "2026-02-03T09:00:00Z",
            "ends_at": "2026-02-03T17:00:00Z",
            "break_minutes": 900
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "break too long");

    let (status, _) = request(
        &t.app,
        "POST",
        "/timesheets",
        Some(&token),
        Some(json!({
            "client_id": client_id,
            "work_date": "2026-02-03",
            "starts_at": "2026-02-03T09:00:00Z",
            "ends_at": "2026-02-03T17:00:00Z",
            "status": "approved"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "cannot create pre-approved");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM timesheets")
        .fetch_one(&t.pool)
        .await?;
    assert_eq!(count, 0);

    Ok(())
}
