use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use uuid::Uuid;

use crate::{clients::StatusReporter, config::Config, models::notification::StatusUpdate};

/// Reports worker outcomes to the gateway's reconciliation endpoint.
pub struct GatewayClient {
    http_client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(config: &Config, base_url: &str) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StatusReporter for GatewayClient {
    async fn report(&self, notification_id: Uuid, update: &StatusUpdate) -> Result<(), Error> {
        let url = format!(
            "{}/api/v1/notifications/{}/status",
            self.base_url, notification_id
        );

        let response = self.http_client.patch(&url).json(update).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Gateway rejected status update with {}",
                response.status()
            ));
        }

        debug!(%notification_id, status = %update.status, "Status reported to gateway");

        Ok(())
    }
}
