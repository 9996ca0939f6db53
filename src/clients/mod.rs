use std::collections::HashMap;

use anyhow::Error;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    error::{DeliveryError, ResolutionError, StoreError},
    notification::{NotificationLog, NotificationType, StatusUpdate},
    template::RenderedContent,
    user::DirectoryUser,
};

pub mod database;
pub mod gateway;
pub mod health;
pub mod memory;
pub mod push;
pub mod rbmq;
pub mod redis;
pub mod smtp;
pub mod template;
pub mod user;

/// Durable, at-least-once queue broker as seen by intake and the workers.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), Error>;

    async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error>;

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error>;
}

/// Durable notification log. `insert` must fail with
/// [`StoreError::DuplicateRequestId`] when the request_id is already present.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Option<NotificationLog>, StoreError>;

    async fn find_by_id(
        &self,
        notification_id: Uuid,
    ) -> Result<Option<NotificationLog>, StoreError>;

    async fn insert(&self, log: &NotificationLog) -> Result<(), StoreError>;

    async fn update_status(
        &self,
        notification_id: Uuid,
        update: &StatusUpdate,
    ) -> Result<Option<NotificationLog>, StoreError>;
}

/// Read-through cache for status lookups. Failures are misses.
#[async_trait]
pub trait StatusCache: Send + Sync {
    async fn get(&self, notification_id: Uuid) -> Option<NotificationLog>;

    /// Overwrites the cached row. Used by writers.
    async fn put(&self, log: &NotificationLog);

    /// Caches the row only if nothing is cached for it yet. Used by readers, so a
    /// row read before a concurrent update cannot replace the updated one.
    async fn fill(&self, log: &NotificationLog);
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup(&self, user_id: &str) -> Result<DirectoryUser, ResolutionError>;
}

#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(
        &self,
        template_code: &str,
        variables: &HashMap<String, String>,
    ) -> Result<RenderedContent, ResolutionError>;
}

#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    fn channel(&self) -> NotificationType;

    async fn deliver(
        &self,
        recipient: &str,
        content: &RenderedContent,
        notification_id: Uuid,
    ) -> Result<(), DeliveryError>;
}

/// Out-of-band path through which workers report final outcomes.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, notification_id: Uuid, update: &StatusUpdate) -> Result<(), Error>;
}
