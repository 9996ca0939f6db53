use std::time::Duration;

use anyhow::Result;
use notification_pipeline::{
    clients::{NotificationStore, StatusCache, database::PostgresStore, redis::RedisClient},
    models::{
        error::StoreError,
        notification::{NotificationLog, NotificationType, StatusUpdate},
        status::NotificationStatus,
    },
};
use testcontainers::{
    GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};
use tokio::time::sleep;

use crate::common::{sample_request, test_config};

async fn connect_with_retry(url: &str) -> Result<PostgresStore> {
    let mut last_error = None;

    // The image restarts once after init, so the first ready line can be stale.
    for _ in 0..20 {
        match PostgresStore::connect(url).await {
            Ok(store) => return Ok(store),
            Err(e) => {
                last_error = Some(e);
                sleep(Duration::from_millis(250)).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("database never became reachable")))
}

/// Test: The Postgres store enforces request_id uniqueness and reconciles status
#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_postgres_store_lifecycle() -> Result<()> {
    let container = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_USER", "notification_user")
        .with_env_var("POSTGRES_PASSWORD", "notification_password")
        .with_env_var("POSTGRES_DB", "notification_db")
        .start()
        .await?;

    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432.tcp()).await?;
    let url = format!(
        "postgres://notification_user:notification_password@{}:{}/notification_db",
        host, port
    );

    let store = connect_with_retry(&url).await?;
    store.migrate().await?;
    store.migrate().await?;

    let log = NotificationLog::pending(&sample_request("r-pg", NotificationType::Email));
    store.insert(&log).await?;

    let duplicate = NotificationLog::pending(&sample_request("r-pg", NotificationType::Push));
    assert!(matches!(
        store.insert(&duplicate).await,
        Err(StoreError::DuplicateRequestId(_))
    ));

    let found = store.find_by_request_id("r-pg").await?;
    assert_eq!(found.map(|l| l.notification_id), Some(log.notification_id));

    let updated = store
        .update_status(log.notification_id, &StatusUpdate::delivered())
        .await?;
    let updated = updated.ok_or_else(|| anyhow::anyhow!("row vanished"))?;
    assert_eq!(updated.status, NotificationStatus::Delivered);
    assert!(updated.delivered_at.is_some());
    assert_eq!(updated.retry_count, 0);

    let failed = store
        .update_status(log.notification_id, &StatusUpdate::failed("bounced".to_string(), 2))
        .await?
        .ok_or_else(|| anyhow::anyhow!("row vanished"))?;
    assert_eq!(failed.status, NotificationStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("bounced"));
    assert_eq!(failed.retry_count, 2);

    assert!(
        store
            .find_by_id(uuid::Uuid::new_v4())
            .await?
            .is_none()
    );

    Ok(())
}

/// Test: Redis fills only empty keys while writers always overwrite
#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_redis_status_cache() -> Result<()> {
    let container = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await?;

    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(6379.tcp()).await?;
    let redis_url = format!("redis://{}:{}", host, port);
    let config = test_config(&[("REDIS_URL", redis_url.as_str())])?;

    let cache = RedisClient::connect(&config).await?;
    cache.ping().await?;

    let log = NotificationLog::pending(&sample_request("r-cache", NotificationType::Push));
    assert!(cache.get(log.notification_id).await.is_none());

    cache.fill(&log).await;
    assert_eq!(cache.get(log.notification_id).await, Some(log.clone()));

    let mut delivered = log.clone();
    delivered.apply(&StatusUpdate::delivered());
    cache.put(&delivered).await;

    // A reader holding the older row must not overwrite the newer one.
    cache.fill(&log).await;
    let cached = cache.get(log.notification_id).await;
    assert_eq!(cached.map(|l| l.status), Some(NotificationStatus::Delivered));

    Ok(())
}
