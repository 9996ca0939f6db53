use std::{collections::HashMap, fmt::Display, future::Future};

use anyhow::{Error, anyhow};
use reqwest::Url;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{config::Config, models::retry::RetryPolicy};

pub fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if config.log_json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Runs `operation` until it succeeds or `policy.max_attempts` attempts have failed,
/// sleeping `base_delay * 2^i` after the i-th (zero-based) failure. The last error is
/// returned unchanged.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_with_backoff_when(policy, |_| true, operation).await
}

/// Like [`retry_with_backoff`], but gives up early on errors for which `should_retry`
/// returns false.
pub async fn retry_with_backoff_when<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(attempt = attempt + 1, max_attempts, "Retry succeeded");
                }
                return Ok(result);
            }
            Err(e) => {
                attempt += 1;

                if attempt >= max_attempts {
                    warn!(
                        max_attempts,
                        error = %e,
                        "Retry failed after exhausting all attempts"
                    );
                    return Err(e);
                }

                if !should_retry(&e) {
                    warn!(attempt, error = %e, "Permanent failure, not retrying");
                    return Err(e);
                }

                let delay = policy.delay_for(attempt - 1);

                debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retry attempt failed, backing off"
                );

                sleep(delay).await;
            }
        }
    }
}

/// Replaces `{{key}}` (whitespace inside the braces allowed) with the matching variable.
/// Placeholders without a matching variable are left as they are. Each `}}` closes the
/// nearest `{{` before it, so `{{ {{name}}` still substitutes `name`.
pub fn render_placeholders(template: &str, variables: &HashMap<String, String>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(close) = rest.find("}}") {
        let end = close + 2;

        let Some(start) = rest[..close].rfind("{{") else {
            rendered.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        };

        let key = rest[start + 2..close].trim();

        rendered.push_str(&rest[..start]);
        match variables.get(key) {
            Some(value) => rendered.push_str(value),
            None => rendered.push_str(&rest[start..end]),
        }

        rest = &rest[end..];
    }

    rendered.push_str(rest);
    rendered
}

/// Appends `segments` to the path of `base`. Each segment is percent-encoded as a
/// whole, so `/`, `?` and `#` inside an id stay part of that id.
pub fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("{} cannot be used as a base URL", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Crude plain-text alternative for an HTML body.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text
}
