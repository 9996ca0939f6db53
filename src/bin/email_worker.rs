use anyhow::{Error, Result};
use notification_pipeline::{
    config::Config, models::notification::NotificationType, utils::init_tracing,
    worker::run_channel_worker,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = Config::load()?;
    init_tracing(&config);

    info!("Starting email worker");

    run_channel_worker(config, NotificationType::Email).await
}
