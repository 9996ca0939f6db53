use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: Option<u64>,
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms: None,
            jitter: 0.0,
        }
    }

    /// Delay before the retry that follows the zero-based `attempt_index`-th failure:
    /// `base_delay * 2^attempt_index`, then capped, then jittered.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt_index).unwrap_or(u64::MAX);
        let mut delay_ms = self.base_delay_ms.saturating_mul(factor);

        if let Some(max_delay_ms) = self.max_delay_ms {
            delay_ms = delay_ms.min(max_delay_ms);
        }

        // NaN fails the comparison and infinity clamps, so the range below is finite.
        let spread = self.jitter.clamp(0.0, 1.0);
        if spread > 0.0 {
            let jitter = rand::random_range(-spread..=spread);
            delay_ms = (delay_ms as f64 * (1.0 + jitter)).max(0.0) as u64;
        }

        Duration::from_millis(delay_ms)
    }
}
