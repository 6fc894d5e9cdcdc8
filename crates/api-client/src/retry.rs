use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

/// Retry behaviour for idempotent reads (state, search, run listing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub delays_ms: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::with_max_retries(2)
    }
}

impl RetryConfig {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delays_ms: Vec::new(),
        }
    }

    /// Doubling backoff starting at 250ms.
    pub fn with_max_retries(max_retries: usize) -> Self {
        let delays_ms = (0..max_retries).map(|i| 250u64 << i.min(6)).collect();
        Self {
            max_retries,
            delays_ms,
        }
    }

    fn delay(&self, attempt: usize) -> Duration {
        let ms = self
            .delays_ms
            .get(attempt)
            .or(self.delays_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(ms)
    }
}

/// Send a request with backoff.
///
/// Retries on network errors and 5xx responses.
/// Returns immediately on success or 4xx.
pub async fn retry_send<F>(
    make_request: F,
    label: &str,
    config: &RetryConfig,
) -> Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        let last_attempt = attempt + 1 >= max_attempts;
        match make_request().send().await {
            Ok(resp) if resp.status().is_server_error() && !last_attempt => {
                let delay = config.delay(attempt);
                warn!(
                    "{label} attempt {}/{} failed (HTTP {}), retrying in {}ms",
                    attempt + 1,
                    max_attempts,
                    resp.status(),
                    delay.as_millis(),
                );
                tokio::time::sleep(delay).await;
            }
            Ok(resp) => return Ok(resp),
            Err(e) if !last_attempt => {
                let delay = config.delay(attempt);
                warn!(
                    "{label} attempt {}/{} failed ({e}), retrying in {}ms",
                    attempt + 1,
                    max_attempts,
                    delay.as_millis(),
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("{label} failed after {max_attempts} attempts"));
            }
        }
        attempt += 1;
    }
}
