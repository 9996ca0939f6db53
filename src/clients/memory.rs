//! In-process implementations of the pipeline seams, for tests and local runs
//! without a broker, database or sibling services.

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Error, anyhow};
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    clients::{MessageBroker, NotificationStore, TemplateRenderer, UserDirectory},
    models::{
        error::{ResolutionError, StoreError},
        message::QueueMessage,
        notification::{NotificationLog, StatusUpdate},
        template::{RenderedContent, Template},
        user::DirectoryUser,
    },
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct StoreState {
    logs: HashMap<Uuid, NotificationLog>,
    by_request_id: HashMap<String, Uuid>,
}

/// Notification log with the same request_id uniqueness guarantee as the database.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    state: Mutex<StoreState>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn find_by_request_id(
        &self,
        request_id: &str,
    ) -> Result<Option<NotificationLog>, StoreError> {
        let state = lock(&self.state);
        Ok(state
            .by_request_id
            .get(request_id)
            .and_then(|id| state.logs.get(id))
            .cloned())
    }

    async fn find_by_id(
        &self,
        notification_id: Uuid,
    ) -> Result<Option<NotificationLog>, StoreError> {
        Ok(lock(&self.state).logs.get(&notification_id).cloned())
    }

    async fn insert(&self, log: &NotificationLog) -> Result<(), StoreError> {
        let mut state = lock(&self.state);

        if state.by_request_id.contains_key(&log.request_id) {
            return Err(StoreError::DuplicateRequestId(log.request_id.clone()));
        }

        state
            .by_request_id
            .insert(log.request_id.clone(), log.notification_id);
        state.logs.insert(log.notification_id, log.clone());

        Ok(())
    }

    async fn update_status(
        &self,
        notification_id: Uuid,
        update: &StatusUpdate,
    ) -> Result<Option<NotificationLog>, StoreError> {
        let mut state = lock(&self.state);

        Ok(state.logs.get_mut(&notification_id).map(|log| {
            log.apply(update);
            log.clone()
        }))
    }
}

#[derive(Default)]
struct BrokerState {
    published: Vec<(String, Vec<u8>)>,
    acknowledged: Vec<u64>,
    rejected: Vec<(u64, bool)>,
}

/// Records publishes and settlements instead of talking to a broker.
#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    fail_publishes: AtomicBool,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail until switched back.
    pub fn set_fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self, queue: &str) -> Vec<Vec<u8>> {
        lock(&self.state)
            .published
            .iter()
            .filter(|(name, _)| name == queue)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Publishes on `queue` decoded as queue messages; undecodable payloads are skipped.
    pub fn messages(&self, queue: &str) -> Vec<QueueMessage> {
        self.published(queue)
            .iter()
            .filter_map(|payload| serde_json::from_slice(payload).ok())
            .collect()
    }

    pub fn publish_count(&self) -> usize {
        lock(&self.state).published.len()
    }

    pub fn acknowledged(&self) -> Vec<u64> {
        lock(&self.state).acknowledged.clone()
    }

    pub fn rejected(&self) -> Vec<(u64, bool)> {
        lock(&self.state).rejected.clone()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), Error> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(anyhow!("Failed to publish message to {}", queue));
        }

        lock(&self.state)
            .published
            .push((queue.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        lock(&self.state).acknowledged.push(delivery_tag);
        Ok(())
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        lock(&self.state).rejected.push((delivery_tag, requeue));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<String, DirectoryUser>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: &str, user: DirectoryUser) {
        lock(&self.users).insert(user_id.to_string(), user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn lookup(&self, user_id: &str) -> Result<DirectoryUser, ResolutionError> {
        lock(&self.users)
            .get(user_id)
            .filter(|user| user.is_active)
            .cloned()
            .ok_or_else(|| ResolutionError::NotFound(format!("user {}", user_id)))
    }
}

/// Renders locally held templates with the placeholder helper.
#[derive(Default)]
pub struct InMemoryTemplateRenderer {
    templates: Mutex<HashMap<String, Template>>,
}

impl InMemoryTemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, template: Template) {
        lock(&self.templates).insert(template.template_code.clone(), template);
    }
}

#[async_trait]
impl TemplateRenderer for InMemoryTemplateRenderer {
    async fn render(
        &self,
        template_code: &str,
        variables: &HashMap<String, String>,
    ) -> Result<RenderedContent, ResolutionError> {
        lock(&self.templates)
            .get(template_code)
            .filter(|template| template.is_active)
            .map(|template| template.render(variables))
            .ok_or_else(|| ResolutionError::NotFound(format!("template {}", template_code)))
    }
}
