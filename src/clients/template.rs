use std::{collections::HashMap, time::Duration};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::{
    clients::TemplateRenderer,
    config::Config,
    models::{
        error::ResolutionError,
        response::ApiResponse,
        template::{RenderRequest, RenderedContent, Template},
    },
    utils::endpoint_url,
};

pub struct TemplateServiceClient {
    http_client: Client,
    base_url: Url,
}

impl TemplateServiceClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let base_url = Url::parse(&config.template_service_url)
            .map_err(|e| anyhow!("Invalid template service URL: {}", e))?;

        info!(base_url = %base_url, "Template service client initialized");

        Ok(Self { http_client, base_url })
    }

    fn template_url(
        &self,
        template_code: &str,
        action: Option<&str>,
    ) -> Result<Url, ResolutionError> {
        let mut segments = vec!["api", "v1", "templates", template_code];
        segments.extend(action);

        endpoint_url(&self.base_url, &segments)
            .map_err(|e| ResolutionError::Unavailable(e.to_string()))
    }

    pub async fn fetch_template(&self, template_code: &str) -> Result<Template, ResolutionError> {
        let url = self.template_url(template_code, None)?;

        debug!(template_code, "Fetching template from service");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolutionError::Unavailable(e.to_string()))?;

        read_envelope(response, template_code).await
    }

    async fn render_remote(
        &self,
        template_code: &str,
        variables: &HashMap<String, String>,
    ) -> Result<RenderedContent, ResolutionError> {
        let url = self.template_url(template_code, Some("render"))?;

        debug!(
            template_code,
            variable_count = variables.len(),
            "Rendering template"
        );

        let response = self
            .http_client
            .post(url)
            .json(&RenderRequest { variables })
            .send()
            .await
            .map_err(|e| ResolutionError::Unavailable(e.to_string()))?;

        read_envelope(response, template_code).await
    }
}

#[async_trait]
impl TemplateRenderer for TemplateServiceClient {
    async fn render(
        &self,
        template_code: &str,
        variables: &HashMap<String, String>,
    ) -> Result<RenderedContent, ResolutionError> {
        self.render_remote(template_code, variables)
            .await
            .inspect_err(|e| warn!(template_code, error = %e, "Template render failed"))
    }
}

async fn read_envelope<T: DeserializeOwned>(
    response: Response,
    template_code: &str,
) -> Result<T, ResolutionError> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(ResolutionError::NotFound(format!("template {}", template_code)));
    }

    if !status.is_success() {
        return Err(ResolutionError::Unavailable(format!(
            "Template Service returned status {}",
            status
        )));
    }

    let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
        ResolutionError::Unavailable(format!("Failed to parse template JSON: {}", e))
    })?;

    envelope
        .into_data()
        .ok_or_else(|| ResolutionError::NotFound(format!("template {}", template_code)))
}
