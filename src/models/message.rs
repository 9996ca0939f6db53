use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::notification::{NotificationLog, NotificationRequest};

/// Wire payload on the channel queues and on the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub notification_id: Uuid,
    pub user_id: String,
    pub template_code: String,

    #[serde(default)]
    pub variables: HashMap<String, String>,

    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default)]
    pub retry_count: u32,
}

fn default_priority() -> i32 {
    1
}

impl QueueMessage {
    pub fn for_log(log: &NotificationLog, request: &NotificationRequest) -> Self {
        Self {
            notification_id: log.notification_id,
            user_id: log.user_id.clone(),
            template_code: log.template_code.clone(),
            variables: request.variables.to_map(),
            priority: log.priority,
            retry_count: 0,
        }
    }

    pub fn requeued(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}
