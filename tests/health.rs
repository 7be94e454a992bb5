use anyhow::Result;
use axum::http::StatusCode;

mod common;
use common::{request, setup};

#[tokio::test]
async fn health_reports_db_status() -> Result<()> {
    let t = setup().await?;

    let (status, body) = request(&t.app, "GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_ok"], true);

    Ok(())
}
