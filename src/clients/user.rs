use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info, warn};

use crate::{
    clients::UserDirectory,
    config::Config,
    models::{error::ResolutionError, response::ApiResponse, user::DirectoryUser},
    utils::endpoint_url,
};

pub struct UserServiceClient {
    http_client: Client,
    base_url: Url,
}

impl UserServiceClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let base_url = Url::parse(&config.user_service_url)
            .map_err(|e| anyhow!("Invalid user service URL: {}", e))?;

        info!(base_url = %base_url, "User service client initialized");

        Ok(Self { http_client, base_url })
    }
}

#[async_trait]
impl UserDirectory for UserServiceClient {
    async fn lookup(&self, user_id: &str) -> Result<DirectoryUser, ResolutionError> {
        let url = endpoint_url(&self.base_url, &["api", "v1", "users", user_id])
            .map_err(|e| ResolutionError::Unavailable(e.to_string()))?;

        debug!(user_id, "Fetching user from user service");

        let response = self.http_client.get(url).send().await.map_err(|e| {
            warn!(user_id, error = %e, "User service request failed");
            ResolutionError::Unavailable(e.to_string())
        })?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ResolutionError::NotFound(format!("user {}", user_id)));
        }

        if !status.is_success() {
            warn!(user_id, %status, "User service returned an error status");
            return Err(ResolutionError::Unavailable(format!(
                "user service returned status {}",
                status
            )));
        }

        let envelope: ApiResponse<DirectoryUser> = response.json().await.map_err(|e| {
            ResolutionError::Unavailable(format!("failed to parse user response: {}", e))
        })?;

        let user = envelope
            .into_data()
            .ok_or_else(|| ResolutionError::NotFound(format!("user {}", user_id)))?;

        if !user.is_active {
            return Err(ResolutionError::NotFound(format!("user {} (inactive)", user_id)));
        }

        Ok(user)
    }
}
