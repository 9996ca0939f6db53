use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, Row, error::SqlState};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    clients::NotificationStore,
    models::{
        error::StoreError,
        notification::{NotificationLog, StatusUpdate},
    },
};

const SCHEMA: &str = include_str!("../../migrations/notification_logs.sql");

const SELECT_COLUMNS: &str = "notification_id, request_id, user_id, notification_type, \
     template_code, status, priority, retry_count, error_message, created_at, updated_at, delivered_at";

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection closed with error");
            }
        });

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        self.client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| anyhow!("Failed to initialize database schema: {}", e))?;

        info!("Database schema initialized");

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Option<NotificationLog>, StoreError> {
        let query = format!(
            "SELECT {} FROM notification_logs WHERE request_id = $1",
            SELECT_COLUMNS
        );

        let row = self
            .client
            .query_opt(&query, &[&request_id])
            .await
            .map_err(backend)?;

        row.map(|row| row_to_log(&row)).transpose()
    }

    async fn find_by_id(
        &self,
        notification_id: Uuid,
    ) -> Result<Option<NotificationLog>, StoreError> {
        let query = format!(
            "SELECT {} FROM notification_logs WHERE notification_id = $1",
            SELECT_COLUMNS
        );

        let row = self
            .client
            .query_opt(&query, &[&notification_id])
            .await
            .map_err(backend)?;

        row.map(|row| row_to_log(&row)).transpose()
    }

    async fn insert(&self, log: &NotificationLog) -> Result<(), StoreError> {
        let notification_type = log.notification_type.as_str();
        let status = log.status.as_str();

        self.client
            .execute(
                r#"
                INSERT INTO notification_logs (
                    notification_id,
                    request_id,
                    user_id,
                    notification_type,
                    template_code,
                    status,
                    priority,
                    retry_count,
                    error_message,
                    created_at,
                    updated_at,
                    delivered_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
                &[
                    &log.notification_id,
                    &log.request_id,
                    &log.user_id,
                    &notification_type,
                    &log.template_code,
                    &status,
                    &log.priority,
                    &log.retry_count,
                    &log.error_message,
                    &log.created_at,
                    &log.updated_at,
                    &log.delivered_at,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    return StoreError::DuplicateRequestId(log.request_id.clone());
                }
                error!(
                    error = %e,
                    request_id = %log.request_id,
                    "Failed to insert notification log"
                );
                backend(e)
            })?;

        debug!(
            notification_id = %log.notification_id,
            request_id = %log.request_id,
            "Notification log inserted"
        );

        Ok(())
    }

    async fn update_status(
        &self,
        notification_id: Uuid,
        update: &StatusUpdate,
    ) -> Result<Option<NotificationLog>, StoreError> {
        let status = update.status.as_str();
        let query = format!(
            r#"
            UPDATE notification_logs
            SET status = $2,
                error_message = COALESCE($3, error_message),
                retry_count = COALESCE($4, retry_count),
                delivered_at = CASE WHEN $2 = 'delivered' THEN COALESCE($5, now()) ELSE delivered_at END,
                updated_at = now()
            WHERE notification_id = $1
            RETURNING {}
            "#,
            SELECT_COLUMNS
        );

        let row = self
            .client
            .query_opt(
                &query,
                &[
                    &notification_id,
                    &status,
                    &update.error,
                    &update.retry_count,
                    &update.timestamp,
                ],
            )
            .await
            .map_err(backend)?;

        row.map(|row| row_to_log(&row)).transpose()
    }
}

fn backend(error: tokio_postgres::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn row_to_log(row: &Row) -> Result<NotificationLog, StoreError> {
    let notification_type: String = row.try_get("notification_type").map_err(backend)?;
    let status: String = row.try_get("status").map_err(backend)?;

    Ok(NotificationLog {
        notification_id: row.try_get("notification_id").map_err(backend)?,
        request_id: row.try_get("request_id").map_err(backend)?,
        user_id: row.try_get("user_id").map_err(backend)?,
        notification_type: notification_type.parse().map_err(StoreError::Backend)?,
        template_code: row.try_get("template_code").map_err(backend)?,
        status: status.parse().map_err(StoreError::Backend)?,
        priority: row.try_get("priority").map_err(backend)?,
        retry_count: row.try_get("retry_count").map_err(backend)?,
        error_message: row.try_get("error_message").map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
        updated_at: row.try_get("updated_at").map_err(backend)?,
        delivered_at: row.try_get("delivered_at").map_err(backend)?,
    })
}
