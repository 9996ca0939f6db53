use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, ExistenceCheck, SetExpiry, SetOptions, aio::MultiplexedConnection,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{clients::StatusCache, config::Config, models::notification::NotificationLog};

pub struct RedisClient {
    connection: MultiplexedConnection,
    ttl_seconds: u64,
}

impl RedisClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to Redis");

        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| anyhow!("Failed to create redis client: {}", e))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| anyhow!("Failed to connect to redis: {}", e))?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            ttl_seconds: config.status_cache_ttl_seconds,
        })
    }

    pub async fn ping(&self) -> Result<(), Error> {
        let mut connection = self.connection.clone();
        connection
            .ping::<String>()
            .await
            .map_err(|e| anyhow!("Redis ping failed: {}", e))?;
        Ok(())
    }

    fn key(notification_id: Uuid) -> String {
        format!("notification:status:{}", notification_id)
    }

    fn entry(log: &NotificationLog) -> Option<(String, String)> {
        match serde_json::to_string(log) {
            Ok(value) => Some((Self::key(log.notification_id), value)),
            Err(e) => {
                warn!(error = %e, "Failed to serialize status for cache");
                None
            }
        }
    }
}

#[async_trait]
impl StatusCache for RedisClient {
    async fn get(&self, notification_id: Uuid) -> Option<NotificationLog> {
        let key = Self::key(notification_id);
        let mut connection = self.connection.clone();

        let value: Option<String> = match connection.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, key = %key, "Failed to read cached status");
                return None;
            }
        };

        match serde_json::from_str(&value?) {
            Ok(log) => {
                debug!(key = %key, "Status cache hit");
                Some(log)
            }
            Err(e) => {
                warn!(error = %e, key = %key, "Discarding unreadable cached status");
                None
            }
        }
    }

    async fn put(&self, log: &NotificationLog) {
        let Some((key, value)) = Self::entry(log) else {
            return;
        };

        let mut connection = self.connection.clone();
        if let Err(e) = connection
            .set_ex::<_, _, ()>(&key, value, self.ttl_seconds)
            .await
        {
            warn!(error = %e, key = %key, "Failed to cache status");
        }
    }

    async fn fill(&self, log: &NotificationLog) {
        let Some((key, value)) = Self::entry(log) else {
            return;
        };

        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::NX)
            .with_expiration(SetExpiry::EX(self.ttl_seconds));

        let mut connection = self.connection.clone();
        if let Err(e) = connection
            .set_options::<_, _, ()>(&key, value, options)
            .await
        {
            warn!(error = %e, key = %key, "Failed to cache status");
        }
    }
}
