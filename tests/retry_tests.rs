use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use notification_pipeline::{
    models::retry::RetryPolicy,
    utils::{render_placeholders, retry_with_backoff, retry_with_backoff_when, strip_html},
};
use tokio::time::Instant;

use crate::common::test_config;

fn counting_operation(
    calls: &Arc<AtomicU32>,
    succeed_on: u32,
) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, String>> + Send>> {
    let calls = calls.clone();
    move || {
        let calls = calls.clone();
        Box::pin(async move {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= succeed_on {
                Ok(call)
            } else {
                Err(format!("attempt {} failed", call))
            }
        })
    }
}

/// Test: A first-try success makes exactly one call and never sleeps
#[tokio::test(start_paused = true)]
async fn test_success_on_first_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let result = retry_with_backoff(&RetryPolicy::new(3, 100), counting_operation(&calls, 1)).await;

    assert_eq!(result, Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

/// Test: Backoff doubles between attempts until the operation succeeds
#[tokio::test(start_paused = true)]
async fn test_success_after_transient_failures() {
    let calls = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let result = retry_with_backoff(&RetryPolicy::new(3, 100), counting_operation(&calls, 3)).await;

    assert_eq!(result, Ok(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(310), "elapsed {:?}", elapsed);
}

/// Test: Exhaustion returns the last error without sleeping after the final attempt
#[tokio::test(start_paused = true)]
async fn test_exhaustion_returns_last_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let result =
        retry_with_backoff(&RetryPolicy::new(4, 100), counting_operation(&calls, u32::MAX)).await;

    assert_eq!(result, Err("attempt 4 failed".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // 100 + 200 + 400, nothing after the fourth failure
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(700), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(710), "elapsed {:?}", elapsed);
}

/// Test: Errors the predicate refuses are not retried
#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_stops_immediately() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = retry_with_backoff_when(
        &RetryPolicy::new(5, 100),
        |_: &String| false,
        counting_operation(&calls, u32::MAX),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Test: A zero attempt budget still runs the operation once
#[tokio::test(start_paused = true)]
async fn test_zero_attempts_runs_once() {
    let calls = Arc::new(AtomicU32::new(0));

    let result = retry_with_backoff(&RetryPolicy::new(0, 100), counting_operation(&calls, 5)).await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_delay_is_capped() {
    let policy = RetryPolicy {
        max_delay_ms: Some(1_000),
        ..RetryPolicy::new(10, 300)
    };

    assert_eq!(policy.delay_for(0), Duration::from_millis(300));
    assert_eq!(policy.delay_for(1), Duration::from_millis(600));
    assert_eq!(policy.delay_for(2), Duration::from_millis(1_000));
    assert_eq!(policy.delay_for(40), Duration::from_millis(1_000));
}

#[test]
fn test_jitter_stays_within_bounds() {
    let policy = RetryPolicy {
        jitter: 0.25,
        ..RetryPolicy::new(3, 1_000)
    };

    for _ in 0..100 {
        let delay = policy.delay_for(1).as_millis();
        assert!((1_500..=2_500).contains(&delay), "delay {}", delay);
    }
}

#[test]
fn test_unbounded_jitter_is_clamped() {
    let policy = RetryPolicy {
        jitter: f64::INFINITY,
        ..RetryPolicy::new(3, 1_000)
    };

    for _ in 0..100 {
        assert!(policy.delay_for(0) <= Duration::from_millis(2_000));
    }

    let policy = RetryPolicy {
        jitter: f64::NAN,
        ..RetryPolicy::new(3, 1_000)
    };
    assert_eq!(policy.delay_for(0), Duration::from_millis(1_000));
}

#[test]
fn test_jitter_outside_unit_range_is_rejected() -> Result<()> {
    for jitter in ["inf", "NaN", "1.5", "-0.1"] {
        assert!(
            test_config(&[("RETRY_JITTER", jitter)]).is_err(),
            "jitter {} was accepted",
            jitter
        );
    }

    let config = test_config(&[("RETRY_JITTER", "0.5")])?;
    assert_eq!(config.retry_policy().jitter, 0.5);

    Ok(())
}

#[test]
fn test_large_attempt_index_saturates() {
    let policy = RetryPolicy::new(3, 5_000);

    assert_eq!(policy.delay_for(80), Duration::from_millis(u64::MAX));
}

#[test]
fn test_placeholders_are_substituted() {
    let variables = HashMap::from([
        ("name".to_string(), "Ada".to_string()),
        ("link".to_string(), "https://example.com".to_string()),
    ]);

    assert_eq!(
        render_placeholders("Hello {{name}}, see {{ link }}", &variables),
        "Hello Ada, see https://example.com"
    );
    assert_eq!(
        render_placeholders("Hi {{name}} from {{team}}", &variables),
        "Hi Ada from {{team}}"
    );
    assert_eq!(render_placeholders("No placeholders", &variables), "No placeholders");
    assert_eq!(render_placeholders("Broken {{name", &variables), "Broken {{name");
    assert_eq!(render_placeholders("{{ {{name}}", &variables), "{{ Ada");
    assert_eq!(render_placeholders("{{a}} }} {{name}}", &variables), "{{a}} }} Ada");
}

#[test]
fn test_empty_variables_leave_plain_text_unchanged() {
    let empty = HashMap::new();

    for template in ["No placeholders", "", "Braces { } and }} alone", "<p>Hi</p>"] {
        assert_eq!(render_placeholders(template, &empty), template);
    }
}

#[test]
fn test_html_tags_are_stripped() {
    assert_eq!(strip_html("<p>Hi <b>Ada</b></p><br/>"), "Hi Ada");
    assert_eq!(strip_html("no markup"), "no markup");
    assert_eq!(strip_html("a > b"), "a > b");
}
