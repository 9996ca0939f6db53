use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::{status::NotificationStatus, user::UserPreferences};

/// A delivery medium. Each channel has its own queue and worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Email,
    Push,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Email => "email",
            NotificationType::Push => "push",
        }
    }

    /// Per-channel opt-in. A preference the directory did not report counts as enabled.
    pub fn is_enabled_for(&self, preferences: &UserPreferences) -> bool {
        match self {
            NotificationType::Email => preferences.email,
            NotificationType::Push => preferences.push,
        }
    }
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(NotificationType::Email),
            "push" => Ok(NotificationType::Push),
            other => Err(format!("unknown notification type '{}'", other)),
        }
    }
}

/// Template variables as accepted at intake. `name` and `link` are mandatory for
/// compatibility with existing clients; any other string keys ride along.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateVariables {
    pub name: String,
    pub link: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<JsonValue>,

    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl TemplateVariables {
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut variables = self.extra.clone();
        variables.insert("name".to_string(), self.name.clone());
        variables.insert("link".to_string(), self.link.clone());
        variables
    }
}

fn default_priority() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub notification_type: NotificationType,
    pub user_id: String,
    pub template_code: String,
    pub variables: TemplateVariables,
    pub request_id: String,

    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLog {
    pub notification_id: Uuid,
    pub request_id: String,
    pub user_id: String,
    pub notification_type: NotificationType,
    pub template_code: String,
    pub status: NotificationStatus,
    pub priority: i32,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl NotificationLog {
    pub fn pending(request: &NotificationRequest) -> Self {
        let now = Utc::now();

        Self {
            notification_id: Uuid::new_v4(),
            request_id: request.request_id.clone(),
            user_id: request.user_id.clone(),
            notification_type: request.notification_type,
            template_code: request.template_code.clone(),
            status: NotificationStatus::Pending,
            priority: request.priority,
            retry_count: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
        }
    }

    /// Applies a reconciliation update in place.
    pub fn apply(&mut self, update: &StatusUpdate) {
        let now = Utc::now();

        self.status = update.status;
        self.updated_at = now;

        if update.status == NotificationStatus::Delivered {
            self.delivered_at = Some(update.timestamp.unwrap_or(now));
        }
        if let Some(error) = &update.error {
            self.error_message = Some(error.clone());
        }
        if let Some(retry_count) = update.retry_count {
            self.retry_count = retry_count;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: NotificationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<i32>,
}

impl StatusUpdate {
    pub fn delivered() -> Self {
        Self {
            status: NotificationStatus::Delivered,
            timestamp: Some(Utc::now()),
            error: None,
            retry_count: None,
        }
    }

    pub fn failed(error: String, retry_count: i32) -> Self {
        Self {
            status: NotificationStatus::Failed,
            timestamp: Some(Utc::now()),
            error: Some(error),
            retry_count: Some(retry_count),
        }
    }
}

/// Response body for a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub notification_id: Uuid,
    pub status: NotificationStatus,

    #[serde(skip)]
    pub duplicate: bool,
}
