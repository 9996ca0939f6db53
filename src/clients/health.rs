use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use anyhow::{Error, Result, anyhow};
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, warn};

use crate::{
    clients::{database::PostgresStore, rbmq::RabbitMqClient, redis::RedisClient},
    config::Config,
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Database,
    Cache,
    MessageBroker,
    UserService,
    TemplateService,
}

impl Component {
    pub fn key(&self) -> &'static str {
        match self {
            Component::Database => "database",
            Component::Cache => "cache_service",
            Component::MessageBroker => "message_broker",
            Component::UserService => "user_service",
            Component::TemplateService => "template_service",
        }
    }

    /// Sibling services only degrade us; losing infrastructure makes us unhealthy.
    fn is_critical(&self) -> bool {
        matches!(self, Component::Database | Component::MessageBroker)
    }
}

pub struct HealthChecker {
    service: String,
    config: Config,
    components: Vec<Component>,
    http_client: Client,
}

impl HealthChecker {
    pub fn new(service: &str, config: Config, components: Vec<Component>) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            service: service.to_string(),
            config,
            components,
            http_client,
        })
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        for component in &self.components {
            let health = match component {
                Component::Database => self.check_database().await,
                Component::Cache => self.check_redis().await,
                Component::MessageBroker => self.check_rabbitmq().await,
                Component::UserService => self.check_http(&self.config.user_service_url).await,
                Component::TemplateService => {
                    self.check_http(&self.config.template_service_url).await
                }
            };

            let health = if health.status == HealthStatus::Unhealthy && !component.is_critical() {
                ServiceHealth::degraded(health.error.unwrap_or_default())
            } else {
                health
            };

            checks.insert(component.key().to_string(), health);
        }

        HealthCheckResponse {
            service: self.service.clone(),
            status: determine_overall_status(&checks),
            timestamp: Utc::now(),
            checks,
        }
    }

    async fn check_database(&self) -> ServiceHealth {
        let start = Instant::now();

        match PostgresStore::connect(&self.config.database_url).await {
            Ok(store) => match store.health_check().await {
                Ok(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    debug!(response_time_ms = elapsed, "Database health check passed");
                    ServiceHealth::healthy(elapsed)
                }
                Err(e) => {
                    warn!(error = %e, "Database health check failed");
                    ServiceHealth::unhealthy(format!("Health check query failed: {}", e))
                }
            },
            Err(e) => {
                warn!(error = %e, "Database connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_redis(&self) -> ServiceHealth {
        let start = Instant::now();

        match RedisClient::connect(&self.config).await {
            Ok(client) => match client.ping().await {
                Ok(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    debug!(response_time_ms = elapsed, "Redis health check passed");
                    ServiceHealth::healthy(elapsed)
                }
                Err(e) => {
                    warn!(error = %e, "Redis ping failed");
                    ServiceHealth::unhealthy(format!("Ping failed: {}", e))
                }
            },
            Err(e) => {
                warn!(error = %e, "Redis connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_rabbitmq(&self) -> ServiceHealth {
        let start = Instant::now();

        match RabbitMqClient::connect(&self.config, &[]).await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "RabbitMQ health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "RabbitMQ connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_http(&self, base_url: &str) -> ServiceHealth {
        let start = Instant::now();
        let url = format!("{}/health", base_url.trim_end_matches('/'));

        match self.http_client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                ServiceHealth::healthy(start.elapsed().as_millis() as u64)
            }
            Ok(response) => {
                ServiceHealth::unhealthy(format!("{} returned {}", url, response.status()))
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Dependency health check failed");
                ServiceHealth::unhealthy(format!("Request failed: {}", e))
            }
        }
    }
}

pub fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
    let has_unhealthy = checks
        .values()
        .any(|health| health.status == HealthStatus::Unhealthy);

    let has_degraded = checks
        .values()
        .any(|health| health.status == HealthStatus::Degraded);

    if has_unhealthy {
        HealthStatus::Unhealthy
    } else if has_degraded {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
