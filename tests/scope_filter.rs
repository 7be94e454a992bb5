use anyhow::Result;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

mod common;
use common::{assign_client, create_client, create_member, login, request, setup};

async fn seed_shift(
    pool: &sqlx::SqlitePool,
    client_id: Uuid,
    staff_id: Uuid,
    starts_at: &str,
    ends_at: &str,
) -> Result<Uuid> {
    let shift_id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO shifts (id, client_id, user_id, starts_at, ends_at, status, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, 'scheduled', ?, ?, ?)",
    )
    .bind(shift_id)
    .bind(client_id)
    .bind(staff_id)
    .bind(starts_at.parse::<chrono::DateTime<Utc>>()?)
    .bind(ends_at.parse::<chrono::DateTime<Utc>>()?)
    .bind(staff_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(shift_id)
}

#[tokio::test]
async fn shift_listing_is_owned_scoped_for_support_workers() -> Result<()> {
    let t = setup().await?;

    let client_id = create_client(&t.pool, "June", "Osei").await?;
    let worker_a = create_member(&t.pool, "Worker A", "a@example.com", "support_worker").await?;
    let worker_b = create_member(&t.pool, "Worker B", "b@example.com", "support_worker").await?;
    create_member(&t.pool, "Manager", "manager@example.com", "provider_manager").await?;

    let shift_a = seed_shift(&t.pool, client_id, worker_a, "2026-02-03T09:00:00Z", "2026-02-03T12:00:00Z").await?;
    let shift_b = seed_shift(&t.pool, client_id, worker_b, "2026-02-03T13:00:00Z", "2026-02-03T17:00:00Z").await?;

    let token_a = login(&t.app, "a@example.com", "password123").await?;
    let (status, body) = request(&t.app, "GET", "/shifts?date=2026-02-03", Some(&token_a), None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], shift_a.to_string());
    assert_eq!(rows[0]["user_id"], worker_a.to_string());

    // A manager with manageAny sees everything
    let manager_token = login(&t.app, "manager@example.com", "password123").await?;
    let (status, body) = request(&t.app, "GET", "/shifts?date=2026-02-03", Some(&manager_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    // Calendar feed: a staff_id filter naming another user must not
    // widen an Owned-scoped caller's results
    let uri = format!(
        "/calendar/events?start=2026-02-01T00:00:00Z&end=2026-02-28T00:00:00Z&staff_id={worker_b}"
    );
    let (status, body) = request(&t.app, "GET", &uri, Some(&token_a), None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1, "foreign staff filter must be ignored");
    assert_eq!(rows[0]["user_id"], worker_a.to_string());

    // The same filter works for the manager
    let (status, body) = request(&t.app, "GET", &uri, Some(&manager_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], shift_b.to_string());

    Ok(())
}

#[tokio::test]
async fn timesheet_listing_is_owned_scoped_and_filters_are_additive() -> Result<()> {
    let t = setup().await?;

    let client_id = create_client(&t.pool, "June", "Osei").await?;
    create_member(&t.pool, "Worker A", "a@example.com", "support_worker").await?;
    create_member(&t.pool, "Worker B", "b@example.com", "support_worker").await?;
    create_member(&t.pool, "Manager", "manager@example.com", "provider_manager").await?;

    let token_a = login(&t.app, "a@example.com", "password123").await?;
    let token_b = login(&t.app, "b@example.com", "password123").await?;

    for (token, date) in [(&token_a, "2026-02-03"), (&token_b, "2026-02-04")] {
        let (status, body) = request(
            &t.app,
            "POST",
            "/timesheets",
            Some(token),
            Some(json!({
                "client_id": client_id,
                "work_date": date,
                "starts_at": format!("{date}T09:00:00Z"),
                "ends_at": format!("{date}T17:00:00Z")
            })),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, body) = request(&t.app, "GET", "/timesheets", Some(&token_a), None).await?;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1, "worker sees only own timesheets");

    let manager_token = login(&t.app, "manager@example.com", "password123").await?;
    let (status, body) = request(&t.app, "GET", "/timesheets", Some(&manager_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    // Date filters narrow within the scope
    let (status, body) = request(
        &t.app,
        "GET",
        "/timesheets?from=2026-02-04&to=2026-02-04",
        Some(&manager_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // A status filter cannot widen an Owned scope
    let (status, body) = request(
        &t.app,
        "GET",
        "/timesheets?status=draft",
        Some(&token_a),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn client_listing_follows_assignments_for_support_workers() -> Result<()> {
    let t = setup().await?;

    let assigned = create_client(&t.pool, "Assigned", "Client").await?;
    let _other = create_client(&t.pool, "Other", "Client").await?;

    let worker = create_member(&t.pool, "Worker", "worker@example.com", "support_worker").await?;
    create_member(&t.pool, "Manager", "manager@example.com", "provider_manager").await?;
    assign_client(&t.pool, assigned, worker).await?;

    let worker_token = login(&t.app, "worker@example.com", "password123").await?;
    let (status, body) = request(&t.app, "GET", "/clients", Some(&worker_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], assigned.to_string());

    // Single-record access follows the same rule even with a known id
    let (status, _) = request(&t.app, "GET", &format!("/clients/{_other}"), Some(&worker_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "guessing an id must not leak the record");

    let (status, body) = request(&t.app, "GET", &format!("/clients/{assigned}"), Some(&worker_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], assigned.to_string());

    // Managers are globally scoped
    let manager_token = login(&t.app, "manager@example.com", "password123").await?;
    let (status, body) = request(&t.app, "GET", "/clients", Some(&manager_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    Ok(())
}
