use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use gcp_auth::TokenProvider;
use reqwest::{Client, RequestBuilder};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    clients::DeliveryAdapter,
    config::Config,
    models::{
        error::DeliveryError,
        notification::NotificationType,
        push::{FcmMessage, FcmNotification, FcmRequest, OneSignalPayload},
        template::RenderedContent,
        validation::validate_push_token,
    },
};

const FCM_SCOPES: &[&str] = &["https://www.googleapis.com/auth/firebase.messaging"];

/// The push gateway in use. The first configured provider wins.
#[derive(Debug, Clone, PartialEq)]
pub enum PushProvider {
    Fcm {
        project_id: String,
        base_url: String,
    },
    OneSignal {
        app_id: String,
        api_key: String,
        base_url: String,
    },
    Simulated,
}

impl PushProvider {
    pub fn from_config(config: &Config) -> Self {
        if let Some(project_id) = config.fcm_project_id() {
            return PushProvider::Fcm {
                project_id: project_id.to_string(),
                base_url: config.fcm_base_url.trim_end_matches('/').to_string(),
            };
        }

        if let Some((app_id, api_key)) = config.onesignal_credentials() {
            return PushProvider::OneSignal {
                app_id: app_id.to_string(),
                api_key: api_key.to_string(),
                base_url: config.onesignal_base_url.trim_end_matches('/').to_string(),
            };
        }

        PushProvider::Simulated
    }

    pub fn name(&self) -> &'static str {
        match self {
            PushProvider::Fcm { .. } => "fcm",
            PushProvider::OneSignal { .. } => "onesignal",
            PushProvider::Simulated => "simulated",
        }
    }
}

pub struct PushAdapter {
    http_client: Client,
    provider: PushProvider,
    token_provider: OnceCell<Arc<dyn TokenProvider>>,
}

impl PushAdapter {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let provider = PushProvider::from_config(config);

        match &provider {
            PushProvider::Simulated => {
                warn!("No push provider configured, push sends will be simulated")
            }
            provider => info!(provider = provider.name(), "Push adapter initialized"),
        }

        Ok(Self {
            http_client,
            provider,
            token_provider: OnceCell::new(),
        })
    }

    pub fn provider(&self) -> &PushProvider {
        &self.provider
    }

    async fn fcm_token(&self) -> Result<String, DeliveryError> {
        let provider = self
            .token_provider
            .get_or_try_init(|| async { gcp_auth::provider().await })
            .await
            .map_err(|e| {
                DeliveryError::Unreachable(format!("FCM credentials unavailable: {}", e))
            })?;

        let token = provider
            .token(FCM_SCOPES)
            .await
            .map_err(|e| DeliveryError::Unreachable(format!("FCM token request failed: {}", e)))?;

        Ok(token.as_str().to_string())
    }

    async fn send(&self, request: RequestBuilder) -> Result<(), DeliveryError> {
        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected(format!(
            "{} request failed with {}: {}",
            self.provider.name(),
            status,
            error_text
        )))
    }
}

#[async_trait]
impl DeliveryAdapter for PushAdapter {
    fn channel(&self) -> NotificationType {
        NotificationType::Push
    }

    async fn deliver(
        &self,
        recipient: &str,
        content: &RenderedContent,
        notification_id: Uuid,
    ) -> Result<(), DeliveryError> {
        validate_push_token(recipient)
            .map_err(|e| DeliveryError::InvalidRecipient(e.to_string()))?;

        let data = HashMap::from([("notification_id".to_string(), notification_id.to_string())]);

        debug!(%notification_id, provider = self.provider.name(), "Sending push notification");

        match &self.provider {
            PushProvider::Fcm {
                project_id,
                base_url,
            } => {
                let token = self.fcm_token().await?;
                let url = format!("{}/v1/projects/{}/messages:send", base_url, project_id);
                let request = FcmRequest {
                    message: FcmMessage {
                        token: recipient.to_string(),
                        notification: FcmNotification {
                            title: content.title().to_string(),
                            body: content.body.clone(),
                        },
                        data: Some(data),
                    },
                };

                self.send(self.http_client.post(&url).bearer_auth(token).json(&request))
                    .await?;
            }
            PushProvider::OneSignal {
                app_id,
                api_key,
                base_url,
            } => {
                let url = format!("{}/api/v1/notifications", base_url);
                let payload =
                    OneSignalPayload::new(app_id, recipient, content.title(), &content.body, data);

                self.send(
                    self.http_client
                        .post(&url)
                        .header("Authorization", format!("Basic {}", api_key))
                        .json(&payload),
                )
                .await?;
            }
            PushProvider::Simulated => {
                info!(
                    %notification_id,
                    title = content.title(),
                    "Simulating push send"
                );
                return Ok(());
            }
        }

        info!(%notification_id, provider = self.provider.name(), "Push notification sent");

        Ok(())
    }
}
