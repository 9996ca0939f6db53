use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use notification_pipeline::{api::gateway_router, models::notification::NotificationType};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use crate::common::{Harness, RecordingAdapter, test_config};

fn harness() -> Result<Harness> {
    Ok(Harness::new(
        test_config(&[])?,
        RecordingAdapter::new(NotificationType::Email),
    ))
}

fn submission(request_id: &str) -> Value {
    json!({
        "notification_type": "email",
        "user_id": "u1",
        "template_code": "welcome",
        "variables": { "name": "Ada", "link": "https://example.com/start" },
        "request_id": request_id,
        "priority": 2
    })
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<String>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }

    let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty))?;
    let response = router.clone().oneshot(request).await?;

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, json))
}

/// Test: New submissions are accepted, replays return the same notification
#[tokio::test]
async fn test_submit_is_accepted_then_deduplicated() -> Result<()> {
    let harness = harness()?;
    let router = gateway_router(harness.intake());
    let body = submission("r-api").to_string();

    let (status, first) = send(&router, "POST", "/api/v1/notifications", Some(body.clone())).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(first["success"], true);
    assert_eq!(first["data"]["status"], "pending");

    let (status, second) = send(&router, "POST", "/api/v1/notifications", Some(body)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["notification_id"], first["data"]["notification_id"]);

    assert_eq!(harness.broker.publish_count(), 1);

    Ok(())
}

/// Test: Malformed and incomplete payloads are rejected with the error envelope
#[tokio::test]
async fn test_invalid_submissions_are_unprocessable() -> Result<()> {
    let harness = harness()?;
    let router = gateway_router(harness.intake());

    let mut missing_request_id = submission("unused");
    if let Some(body) = missing_request_id.as_object_mut() {
        body.remove("request_id");
    }

    let mut bad_type = submission("r-bad-type");
    bad_type["notification_type"] = json!("sms");

    let bodies = [
        "{not json".to_string(),
        missing_request_id.to_string(),
        bad_type.to_string(),
        submission("").to_string(),
    ];

    for body in bodies {
        let (status, envelope) = send(&router, "POST", "/api/v1/notifications", Some(body)).await?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(envelope["success"], false);
        assert!(envelope["error"].is_string());
    }

    assert!(harness.store.is_empty());
    assert_eq!(harness.broker.publish_count(), 0);

    Ok(())
}

/// Test: A broker outage is reported as service unavailable
#[tokio::test]
async fn test_submit_with_broker_down_is_unavailable() -> Result<()> {
    let harness = harness()?;
    harness.broker.set_fail_publishes(true);
    let router = gateway_router(harness.intake());

    let (status, envelope) = send(
        &router,
        "POST",
        "/api/v1/notifications",
        Some(submission("r-down").to_string()),
    )
    .await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(envelope["success"], false);

    Ok(())
}

/// Test: Status can be queried and reconciled through the API
#[tokio::test]
async fn test_status_query_and_update() -> Result<()> {
    let harness = harness()?;
    let router = gateway_router(harness.intake());

    let (_, created) = send(
        &router,
        "POST",
        "/api/v1/notifications",
        Some(submission("r-status").to_string()),
    )
    .await?;
    let id = created["data"]["notification_id"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let uri = format!("/api/v1/notifications/{}/status", id);

    let (status, log) = send(&router, "GET", &uri, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log["data"]["status"], "pending");
    assert_eq!(log["data"]["request_id"], "r-status");
    assert_eq!(log["data"]["priority"], 2);

    let update = json!({ "status": "failed", "error": "provider down", "retry_count": 3 });
    let (status, log) = send(&router, "PATCH", &uri, Some(update.to_string())).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log["data"]["status"], "failed");
    assert_eq!(log["data"]["error_message"], "provider down");
    assert_eq!(log["data"]["retry_count"], 3);

    let (_, log) = send(&router, "GET", &uri, None).await?;
    assert_eq!(log["data"]["status"], "failed");

    Ok(())
}

/// Test: Unknown and malformed ids are not found
#[tokio::test]
async fn test_unknown_status_is_not_found() -> Result<()> {
    let router = gateway_router(harness()?.intake());

    let unknown = format!("/api/v1/notifications/{}/status", Uuid::new_v4());
    let (status, envelope) = send(&router, "GET", &unknown, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(envelope["success"], false);

    let (status, _) = send(&router, "GET", "/api/v1/notifications/not-a-uuid/status", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &router,
        "PATCH",
        &unknown,
        Some(json!({ "status": "delivered" }).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
