use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    clients::{MessageBroker, NotificationStore, StatusCache},
    config::Config,
    models::{
        error::{IntakeError, StoreError},
        message::QueueMessage,
        notification::{
            NotificationLog, NotificationRequest, NotificationType, StatusUpdate,
            SubmissionReceipt,
        },
        validation::validate_request,
    },
};

/// Idempotent front door of the pipeline. One request_id maps to exactly one
/// notification log row and at most one published queue message.
#[derive(Clone)]
pub struct IntakeService {
    store: Arc<dyn NotificationStore>,
    broker: Arc<dyn MessageBroker>,
    cache: Option<Arc<dyn StatusCache>>,
    email_queue: String,
    push_queue: String,
}

impl IntakeService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        broker: Arc<dyn MessageBroker>,
        email_queue: &str,
        push_queue: &str,
    ) -> Self {
        Self {
            store,
            broker,
            cache: None,
            email_queue: email_queue.to_string(),
            push_queue: push_queue.to_string(),
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn NotificationStore>,
        broker: Arc<dyn MessageBroker>,
    ) -> Self {
        Self::new(store, broker, &config.email_queue_name, &config.push_queue_name)
    }

    pub fn with_cache(mut self, cache: Arc<dyn StatusCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn queue_for(&self, channel: NotificationType) -> &str {
        match channel {
            NotificationType::Email => &self.email_queue,
            NotificationType::Push => &self.push_queue,
        }
    }

    pub async fn submit(
        &self,
        request: NotificationRequest,
    ) -> Result<SubmissionReceipt, IntakeError> {
        validate_request(&request).map_err(|e| IntakeError::Validation(e.to_string()))?;

        if let Some(existing) = self.store.find_by_request_id(&request.request_id).await? {
            debug!(
                request_id = %request.request_id,
                notification_id = %existing.notification_id,
                "Duplicate submission, returning existing notification"
            );
            return Ok(duplicate_receipt(&existing));
        }

        let log = NotificationLog::pending(&request);

        match self.store.insert(&log).await {
            Ok(()) => {}
            Err(StoreError::DuplicateRequestId(request_id)) => {
                // Lost the race against a concurrent submission with the same key.
                let existing = self
                    .store
                    .find_by_request_id(&request_id)
                    .await?
                    .ok_or_else(|| {
                        IntakeError::Storage(format!(
                            "request_id {} conflicted but no row was found",
                            request_id
                        ))
                    })?;

                debug!(%request_id, "Concurrent duplicate submission resolved");
                return Ok(duplicate_receipt(&existing));
            }
            Err(e) => return Err(e.into()),
        }

        let message = QueueMessage::for_log(&log, &request);
        let queue = self.queue_for(log.notification_type);

        let payload = serde_json::to_vec(&message)
            .map_err(|e| IntakeError::Storage(format!("Failed to encode message: {}", e)))?;

        if let Err(e) = self.broker.publish(queue, &payload).await {
            error!(
                notification_id = %log.notification_id,
                queue,
                error = %e,
                "Failed to enqueue notification"
            );

            let update = StatusUpdate::failed(format!("Failed to enqueue: {}", e), 0);
            if let Err(store_error) = self.store.update_status(log.notification_id, &update).await
            {
                warn!(
                    notification_id = %log.notification_id,
                    error = %store_error,
                    "Could not mark unqueued notification as failed"
                );
            }

            return Err(IntakeError::QueueUnavailable(e.to_string()));
        }

        info!(
            notification_id = %log.notification_id,
            request_id = %log.request_id,
            channel = %log.notification_type,
            queue,
            "Notification accepted"
        );

        Ok(SubmissionReceipt {
            notification_id: log.notification_id,
            status: log.status,
            duplicate: false,
        })
    }

    pub async fn get_status(&self, notification_id: Uuid) -> Result<NotificationLog, IntakeError> {
        if let Some(cache) = &self.cache {
            if let Some(log) = cache.get(notification_id).await {
                return Ok(log);
            }
        }

        let log = self
            .store
            .find_by_id(notification_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(notification_id.to_string()))?;

        if let Some(cache) = &self.cache {
            cache.fill(&log).await;
        }

        Ok(log)
    }

    /// Reconciliation entry point for the workers' final outcomes.
    pub async fn update_status(
        &self,
        notification_id: Uuid,
        update: &StatusUpdate,
    ) -> Result<NotificationLog, IntakeError> {
        let log = self
            .store
            .update_status(notification_id, update)
            .await?
            .ok_or_else(|| IntakeError::NotFound(notification_id.to_string()))?;

        if let Some(cache) = &self.cache {
            cache.put(&log).await;
        }

        info!(%notification_id, status = %log.status, "Notification status updated");

        Ok(log)
    }
}

fn duplicate_receipt(log: &NotificationLog) -> SubmissionReceipt {
    SubmissionReceipt {
        notification_id: log.notification_id,
        status: log.status,
        duplicate: true,
    }
}
