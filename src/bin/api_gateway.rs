use std::sync::Arc;

use anyhow::{Error, Result};
use notification_pipeline::{
    api,
    clients::{
        database::PostgresStore,
        health::{Component, HealthChecker},
        rbmq::RabbitMqClient,
        redis::RedisClient,
    },
    config::Config,
    intake::IntakeService,
    utils::init_tracing,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = Config::load()?;
    init_tracing(&config);

    info!("Starting API gateway");

    let store = PostgresStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let rabbitmq = RabbitMqClient::connect(
        &config,
        &[
            config.email_queue_name.as_str(),
            config.push_queue_name.as_str(),
            config.failed_queue_name.as_str(),
        ],
    )
    .await?;

    let mut intake = IntakeService::from_config(&config, Arc::new(store), Arc::new(rabbitmq));

    match RedisClient::connect(&config).await {
        Ok(cache) => intake = intake.with_cache(Arc::new(cache)),
        Err(e) => warn!(
            error = %e,
            "Status cache unavailable, serving reads from the database"
        ),
    }

    let health_checker = HealthChecker::new(
        "api-gateway",
        config.clone(),
        vec![
            Component::Database,
            Component::MessageBroker,
            Component::Cache,
        ],
    )?;

    let router = api::gateway_router(intake)
        .merge(api::health_router(Arc::new(health_checker)));

    tokio::select! {
        result = api::serve(config.server_port, router) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    }
}
