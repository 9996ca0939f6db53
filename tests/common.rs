use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    },
};

use anyhow::Result;
use async_trait::async_trait;
use notification_pipeline::{
    clients::{
        DeliveryAdapter, StatusCache, StatusReporter,
        memory::{
            InMemoryBroker, InMemoryNotificationStore, InMemoryTemplateRenderer,
            InMemoryUserDirectory,
        },
    },
    config::Config,
    intake::IntakeService,
    models::{
        error::DeliveryError,
        notification::{
            NotificationLog, NotificationRequest, NotificationType, StatusUpdate,
            TemplateVariables,
        },
        retry::RetryPolicy,
        template::{RenderedContent, Template},
        user::{DirectoryUser, UserPreferences},
    },
    worker::ChannelWorker,
};
use uuid::Uuid;

pub const PUSH_TOKEN: &str = "fcm-device-token-0123456789abcdef";

pub fn test_config(overrides: &[(&str, &str)]) -> Result<Config> {
    Config::from_vars(
        overrides
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string())),
    )
}

pub fn sample_request(request_id: &str, channel: NotificationType) -> NotificationRequest {
    NotificationRequest {
        notification_type: channel,
        user_id: "u1".to_string(),
        template_code: "welcome".to_string(),
        variables: TemplateVariables {
            name: "Ada".to_string(),
            link: "https://example.com/start".to_string(),
            meta: None,
            extra: HashMap::new(),
        },
        request_id: request_id.to_string(),
        priority: 1,
        metadata: None,
    }
}

pub fn user(
    email: Option<&str>,
    push_token: Option<&str>,
    preferences: UserPreferences,
) -> DirectoryUser {
    DirectoryUser {
        name: Some("Ada".to_string()),
        email: email.map(str::to_string),
        push_token: push_token.map(str::to_string),
        preferences,
        is_active: true,
    }
}

pub fn welcome_template(channel: NotificationType) -> Template {
    Template {
        template_code: "welcome".to_string(),
        notification_type: channel,
        subject: Some("Welcome, {{name}}".to_string()),
        body: "<p>Hi {{ name }}, start here: {{link}}</p>".to_string(),
        language: "en".to_string(),
        variables: vec!["name".to_string(), "link".to_string()],
        version: 1,
        is_active: true,
    }
}

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub recipient: String,
    pub content: RenderedContent,
    pub notification_id: Uuid,
}

/// Delivery adapter that fails a configured number of times, then records sends.
pub struct RecordingAdapter {
    channel: NotificationType,
    failures_remaining: AtomicU32,
    calls: AtomicUsize,
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingAdapter {
    pub fn new(channel: NotificationType) -> Self {
        Self::failing(channel, 0)
    }

    pub fn failing(channel: NotificationType, times: u32) -> Self {
        Self {
            channel,
            failures_remaining: AtomicU32::new(times),
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing(channel: NotificationType) -> Self {
        Self::failing(channel, u32::MAX)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryAdapter for RecordingAdapter {
    fn channel(&self) -> NotificationType {
        self.channel
    }

    async fn deliver(
        &self,
        recipient: &str,
        content: &RenderedContent,
        notification_id: Uuid,
    ) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(DeliveryError::Unreachable("provider down".to_string()));
        }

        self.sent.lock().unwrap().push(SentNotification {
            recipient: recipient.to_string(),
            content: content.clone(),
            notification_id,
        });

        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub updates: Mutex<Vec<(Uuid, StatusUpdate)>>,
}

impl RecordingReporter {
    pub fn updates(&self) -> Vec<(Uuid, StatusUpdate)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn report(&self, notification_id: Uuid, update: &StatusUpdate) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((notification_id, update.clone()));
        Ok(())
    }
}

/// Reports straight into an intake service, the way the gateway endpoint does.
pub struct IntakeReporter(pub IntakeService);

#[async_trait]
impl StatusReporter for IntakeReporter {
    async fn report(&self, notification_id: Uuid, update: &StatusUpdate) -> Result<()> {
        self.0.update_status(notification_id, update).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MapCache {
    pub entries: Mutex<HashMap<Uuid, NotificationLog>>,
    pub puts: AtomicUsize,
    pub fills: AtomicUsize,
}

#[async_trait]
impl StatusCache for MapCache {
    async fn get(&self, notification_id: Uuid) -> Option<NotificationLog> {
        self.entries.lock().unwrap().get(&notification_id).cloned()
    }

    async fn put(&self, log: &NotificationLog) {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(log.notification_id, log.clone());
    }

    async fn fill(&self, log: &NotificationLog) {
        self.fills.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .entry(log.notification_id)
            .or_insert_with(|| log.clone());
    }
}

pub struct Harness {
    pub config: Config,
    pub store: Arc<InMemoryNotificationStore>,
    pub broker: Arc<InMemoryBroker>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub renderer: Arc<InMemoryTemplateRenderer>,
    pub adapter: Arc<RecordingAdapter>,
    pub reporter: Arc<RecordingReporter>,
}

impl Harness {
    pub fn new(config: Config, adapter: RecordingAdapter) -> Self {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let renderer = Arc::new(InMemoryTemplateRenderer::new());
        renderer.insert(welcome_template(adapter.channel()));

        Self {
            config,
            store: Arc::new(InMemoryNotificationStore::new()),
            broker: Arc::new(InMemoryBroker::new()),
            directory,
            renderer,
            adapter: Arc::new(adapter),
            reporter: Arc::new(RecordingReporter::default()),
        }
    }

    pub fn intake(&self) -> IntakeService {
        IntakeService::from_config(&self.config, self.store.clone(), self.broker.clone())
    }

    pub fn worker(&self) -> ChannelWorker {
        ChannelWorker::new(
            &self.config,
            self.adapter.clone(),
            self.directory.clone(),
            self.renderer.clone(),
            self.broker.clone(),
        )
        .with_reporter(self.reporter.clone())
        .with_retry_policy(RetryPolicy::new(self.config.max_retry_attempts, 0))
    }
}
