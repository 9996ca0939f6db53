use anyhow::{Result, anyhow};
use reqwest::Url;

use crate::models::notification::NotificationRequest;

pub fn validate_request(request: &NotificationRequest) -> Result<()> {
    if request.request_id.trim().is_empty() {
        return Err(anyhow!("request_id cannot be empty"));
    }

    if request.request_id.len() > 255 {
        return Err(anyhow!("request_id too long (maximum 255 characters)"));
    }

    if request.user_id.trim().is_empty() {
        return Err(anyhow!("user_id cannot be empty"));
    }

    if request.template_code.trim().is_empty() {
        return Err(anyhow!("template_code cannot be empty"));
    }

    if request.variables.name.trim().is_empty() {
        return Err(anyhow!("variables.name cannot be empty"));
    }

    let link = Url::parse(&request.variables.link)
        .map_err(|e| anyhow!("variables.link is not a valid URL: {}", e))?;

    if !matches!(link.scheme(), "http" | "https") || link.host_str().is_none() {
        return Err(anyhow!("variables.link must be an absolute http(s) URL"));
    }

    Ok(())
}

pub fn validate_push_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(anyhow!("Device token cannot be empty"));
    }

    if token.len() < 20 {
        return Err(anyhow!("Device token too short (minimum 20 characters)"));
    }

    if token.len() > 200 {
        return Err(anyhow!("Device token too long (maximum 200 characters)"));
    }

    let valid_chars = token
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '.');

    if !valid_chars {
        return Err(anyhow!("Device token contains invalid characters"));
    }

    Ok(())
}
