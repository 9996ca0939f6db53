use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use futures_util::StreamExt;
use lapin::Consumer;
use tracing::{debug, error, info, warn};

use crate::{
    api,
    clients::{
        DeliveryAdapter, MessageBroker, StatusReporter, TemplateRenderer, UserDirectory,
        gateway::GatewayClient,
        health::{Component, HealthChecker},
        push::PushAdapter,
        rbmq::RabbitMqClient,
        smtp::SmtpAdapter,
        template::TemplateServiceClient,
        user::UserServiceClient,
    },
    config::Config,
    models::{
        error::{ProcessingError, ResolutionError},
        message::QueueMessage,
        notification::{NotificationType, StatusUpdate},
        retry::RetryPolicy,
        user::DirectoryUser,
    },
    utils::retry_with_backoff_when,
};

/// What happened to one consumed queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Delivered,
    /// The recipient opted out of the channel.
    Skipped,
    Requeued { retry_count: u32 },
    DeadLettered { retry_count: u32 },
    /// The payload could not be decoded.
    Dropped,
}

enum AttemptOutcome {
    Delivered,
    Skipped,
}

/// Consumes one channel queue. The channel is whatever the delivery adapter serves;
/// email and push differ only in the adapter, the contact field and the preference key.
pub struct ChannelWorker {
    adapter: Arc<dyn DeliveryAdapter>,
    directory: Arc<dyn UserDirectory>,
    renderer: Arc<dyn TemplateRenderer>,
    broker: Arc<dyn MessageBroker>,
    reporter: Option<Arc<dyn StatusReporter>>,
    retry_policy: RetryPolicy,
    max_requeues: u32,
    fail_fast: bool,
    queue_name: String,
    failed_queue_name: String,
}

impl ChannelWorker {
    pub fn new(
        config: &Config,
        adapter: Arc<dyn DeliveryAdapter>,
        directory: Arc<dyn UserDirectory>,
        renderer: Arc<dyn TemplateRenderer>,
        broker: Arc<dyn MessageBroker>,
    ) -> Self {
        let queue_name = config.queue_for(adapter.channel()).to_string();

        Self {
            adapter,
            directory,
            renderer,
            broker,
            reporter: None,
            retry_policy: config.retry_policy(),
            max_requeues: config.max_retry_attempts,
            fail_fast: config.fail_fast_on_missing_contact,
            queue_name,
            failed_queue_name: config.failed_queue_name.clone(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn StatusReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn channel(&self) -> NotificationType {
        self.adapter.channel()
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub async fn run(&self, mut consumer: Consumer) -> Result<(), Error> {
        info!(
            channel = %self.channel(),
            queue = %self.queue_name,
            "Worker started, waiting for messages"
        );

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery.map_err(|e| anyhow!("Consumer stream failed: {}", e))?;

            if let Err(e) = self
                .handle_delivery(delivery.delivery_tag, &delivery.data)
                .await
            {
                error!(
                    delivery_tag = delivery.delivery_tag,
                    error = %e,
                    "Message returned to the queue"
                );
            }
        }

        warn!(queue = %self.queue_name, "Consumer stream ended");

        Ok(())
    }

    /// Processes one delivery and settles it exactly once: acknowledged when processing
    /// reached a terminal outcome, rejected back onto the queue when the outcome could
    /// not be republished.
    pub async fn handle_delivery(
        &self,
        delivery_tag: u64,
        payload: &[u8],
    ) -> Result<WorkerOutcome, Error> {
        match self.process_message(payload).await {
            Ok(outcome) => {
                self.broker.acknowledge(delivery_tag).await?;
                debug!(delivery_tag, ?outcome, "Message acknowledged");
                Ok(outcome)
            }
            Err(e) => {
                self.broker.reject(delivery_tag, true).await?;
                Err(e)
            }
        }
    }

    pub async fn process_message(&self, payload: &[u8]) -> Result<WorkerOutcome, Error> {
        let message: QueueMessage = match serde_json::from_slice(payload) {
            Ok(message) => message,
            Err(e) => {
                error!(
                    channel = %self.channel(),
                    error = %e,
                    "Dropping undecodable queue message"
                );
                return Ok(WorkerOutcome::Dropped);
            }
        };

        let notification_id = message.notification_id;

        info!(
            %notification_id,
            channel = %self.channel(),
            retry_count = message.retry_count,
            "Processing notification"
        );

        let fail_fast = self.fail_fast;
        let result = retry_with_backoff_when(
            &self.retry_policy,
            |e: &ProcessingError| !(fail_fast && e.is_permanent()),
            || self.attempt(&message),
        )
        .await;

        match result {
            Ok(AttemptOutcome::Delivered) => {
                info!(%notification_id, channel = %self.channel(), "Notification delivered");
                self.report(&message, StatusUpdate::delivered()).await;
                Ok(WorkerOutcome::Delivered)
            }
            Ok(AttemptOutcome::Skipped) => {
                info!(
                    %notification_id,
                    user_id = %message.user_id,
                    channel = %self.channel(),
                    "Recipient opted out, skipping delivery"
                );
                Ok(WorkerOutcome::Skipped)
            }
            Err(e) => self.handle_exhausted(message, e).await,
        }
    }

    async fn handle_exhausted(
        &self,
        message: QueueMessage,
        failure: ProcessingError,
    ) -> Result<WorkerOutcome, Error> {
        let notification_id = message.notification_id;
        let permanent = self.fail_fast && failure.is_permanent();

        if !permanent && message.retry_count < self.max_requeues {
            let requeued = message.requeued();
            self.publish(&self.queue_name, &requeued).await?;

            warn!(
                %notification_id,
                retry_count = requeued.retry_count,
                error = %failure,
                "Delivery attempts exhausted, message requeued"
            );

            return Ok(WorkerOutcome::Requeued {
                retry_count: requeued.retry_count,
            });
        }

        self.publish(&self.failed_queue_name, &message).await?;

        error!(
            %notification_id,
            retry_count = message.retry_count,
            permanent,
            error = %failure,
            "Notification moved to dead-letter queue"
        );

        self.report(
            &message,
            StatusUpdate::failed(failure.to_string(), message.retry_count as i32),
        )
        .await;

        Ok(WorkerOutcome::DeadLettered {
            retry_count: message.retry_count,
        })
    }

    /// One resolve, render and deliver pass.
    async fn attempt(&self, message: &QueueMessage) -> Result<AttemptOutcome, ProcessingError> {
        let channel = self.channel();

        let user = self
            .directory
            .lookup(&message.user_id)
            .await
            .map_err(|e| match e {
                ResolutionError::NotFound(_) => {
                    ProcessingError::UserNotFound(message.user_id.clone())
                }
                other => ProcessingError::Directory(other),
            })?;

        let recipient =
            contact_for(&user, channel).ok_or_else(|| ProcessingError::MissingContact {
                user_id: message.user_id.clone(),
                channel,
            })?;

        if !channel.is_enabled_for(&user.preferences) {
            return Ok(AttemptOutcome::Skipped);
        }

        let content = self
            .renderer
            .render(&message.template_code, &message.variables)
            .await
            .map_err(ProcessingError::Render)?;

        self.adapter
            .deliver(recipient, &content, message.notification_id)
            .await?;

        Ok(AttemptOutcome::Delivered)
    }

    async fn publish(&self, queue: &str, message: &QueueMessage) -> Result<(), Error> {
        let payload = serde_json::to_vec(message)?;
        self.broker.publish(queue, &payload).await
    }

    async fn report(&self, message: &QueueMessage, update: StatusUpdate) {
        let Some(reporter) = &self.reporter else {
            return;
        };

        if let Err(e) = reporter.report(message.notification_id, &update).await {
            warn!(
                notification_id = %message.notification_id,
                error = %e,
                "Failed to report notification status"
            );
        }
    }
}

fn contact_for(user: &DirectoryUser, channel: NotificationType) -> Option<&str> {
    let contact = match channel {
        NotificationType::Email => user.email.as_deref(),
        NotificationType::Push => user.push_token.as_deref(),
    };

    contact.map(str::trim).filter(|value| !value.is_empty())
}

/// Wires a production worker for `channel` and runs it next to its health endpoint
/// until the consumer stops or the process is interrupted.
pub async fn run_channel_worker(config: Config, channel: NotificationType) -> Result<(), Error> {
    let queue = config.queue_for(channel).to_string();
    let rabbitmq = Arc::new(
        RabbitMqClient::connect(&config, &[queue.as_str(), config.failed_queue_name.as_str()])
            .await?,
    );

    let adapter: Arc<dyn DeliveryAdapter> = match channel {
        NotificationType::Email => Arc::new(SmtpAdapter::new(&config)?),
        NotificationType::Push => Arc::new(PushAdapter::new(&config)?),
    };

    let mut worker = ChannelWorker::new(
        &config,
        adapter,
        Arc::new(UserServiceClient::new(&config)?),
        Arc::new(TemplateServiceClient::new(&config)?),
        rabbitmq.clone(),
    );

    match config.api_gateway_url() {
        Some(url) => {
            worker = worker.with_reporter(Arc::new(GatewayClient::new(&config, url)?));
        }
        None => warn!("API_GATEWAY_URL not set, delivery outcomes will not be reported"),
    }

    let service = format!("{}-worker", channel);
    let consumer = rabbitmq.create_consumer(&queue, &service).await?;

    let health_checker = HealthChecker::new(
        &service,
        config.clone(),
        vec![
            Component::MessageBroker,
            Component::UserService,
            Component::TemplateService,
        ],
    )?;
    let health_router = api::health_router(Arc::new(health_checker));
    let health_server = api::serve(config.server_port, health_router);

    tokio::select! {
        result = worker.run(consumer) => result,
        result = health_server => result,
        _ = tokio::signal::ctrl_c() => {
            info!(%service, "Shutdown signal received");
            Ok(())
        }
    }
}
