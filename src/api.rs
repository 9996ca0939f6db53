use std::sync::Arc;

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::{
    clients::health::HealthChecker,
    intake::IntakeService,
    models::{
        error::IntakeError,
        health::HealthStatus,
        notification::{NotificationLog, NotificationRequest, StatusUpdate, SubmissionReceipt},
        response::ApiResponse,
    },
};

impl IntakeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IntakeError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IntakeError::NotFound(_) => StatusCode::NOT_FOUND,
            IntakeError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            IntakeError::QueueUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let message = match &self {
            IntakeError::Validation(_) => "Invalid notification request",
            IntakeError::NotFound(_) => "Notification not found",
            IntakeError::Storage(_) => "Failed to persist notification",
            IntakeError::QueueUnavailable(_) => "Notification could not be queued",
        };

        let body = ApiResponse::<()>::error(self.to_string(), message.to_string());
        (self.status_code(), Json(body)).into_response()
    }
}

pub fn gateway_router(intake: IntakeService) -> Router {
    Router::new()
        .route("/api/v1/notifications", post(submit_notification))
        .route(
            "/api/v1/notifications/{notification_id}/status",
            get(get_notification_status).patch(update_notification_status),
        )
        .with_state(intake)
}

pub fn health_router(health_checker: Arc<HealthChecker>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(health_checker)
}

pub async fn serve(port: u16, router: Router) -> Result<(), Error> {
    let app = router.layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "HTTP server started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn submit_notification(
    State(intake): State<IntakeService>,
    payload: Result<Json<NotificationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<SubmissionReceipt>>), IntakeError> {
    let Json(request) = payload.map_err(|e| IntakeError::Validation(e.body_text()))?;

    let receipt = intake.submit(request).await?;

    let (status_code, message) = if receipt.duplicate {
        (StatusCode::OK, "Notification already submitted")
    } else {
        (StatusCode::ACCEPTED, "Notification accepted for delivery")
    };

    Ok((
        status_code,
        Json(ApiResponse::success(receipt, message.to_string())),
    ))
}

async fn get_notification_status(
    State(intake): State<IntakeService>,
    Path(notification_id): Path<String>,
) -> Result<Json<ApiResponse<NotificationLog>>, IntakeError> {
    let notification_id = parse_id(&notification_id)?;
    let log = intake.get_status(notification_id).await?;

    Ok(Json(ApiResponse::success(
        log,
        "Notification status retrieved".to_string(),
    )))
}

async fn update_notification_status(
    State(intake): State<IntakeService>,
    Path(notification_id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<ApiResponse<NotificationLog>>, IntakeError> {
    let notification_id = parse_id(&notification_id)?;
    let Json(update) = payload.map_err(|e| IntakeError::Validation(e.body_text()))?;

    let log = intake.update_status(notification_id, &update).await?;

    Ok(Json(ApiResponse::success(
        log,
        "Notification status updated".to_string(),
    )))
}

/// Malformed ids cannot name a notification, so they are reported as unknown.
fn parse_id(raw: &str) -> Result<Uuid, IntakeError> {
    Uuid::parse_str(raw).map_err(|_| IntakeError::NotFound(raw.to_string()))
}

async fn health_check(State(health_checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    let health = health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}
