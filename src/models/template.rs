use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{models::notification::NotificationType, utils::render_placeholders};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub template_code: String,
    pub notification_type: NotificationType,

    #[serde(default)]
    pub subject: Option<String>,

    pub body: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub variables: Vec<String>,

    #[serde(default = "default_version")]
    pub version: i32,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_version() -> i32 {
    1
}

fn default_active() -> bool {
    true
}

impl Template {
    pub fn render(&self, variables: &HashMap<String, String>) -> RenderedContent {
        RenderedContent {
            subject: self
                .subject
                .as_deref()
                .map(|subject| render_placeholders(subject, variables)),
            body: render_placeholders(&self.body, variables),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest<'a> {
    pub variables: &'a HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedContent {
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
}

impl RenderedContent {
    /// Subject for email, title for push.
    pub fn title(&self) -> &str {
        self.subject.as_deref().unwrap_or("Notification")
    }
}
