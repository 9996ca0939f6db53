use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmRequest {
    pub message: FcmMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmMessage {
    pub token: String,
    pub notification: FcmNotification,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneSignalPayload {
    pub app_id: String,
    pub include_player_ids: Vec<String>,
    pub headings: HashMap<String, String>,
    pub contents: HashMap<String, String>,
    pub data: HashMap<String, String>,
}

impl OneSignalPayload {
    pub fn new(
        app_id: &str,
        token: &str,
        title: &str,
        body: &str,
        data: HashMap<String, String>,
    ) -> Self {
        Self {
            app_id: app_id.to_string(),
            include_player_ids: vec![token.to_string()],
            headings: HashMap::from([("en".to_string(), title.to_string())]),
            contents: HashMap::from([("en".to_string(), body.to_string())]),
            data,
        }
    }
}
