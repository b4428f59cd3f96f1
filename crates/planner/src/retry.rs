use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::warn;

/// Fixed number of attempts with linearly growing pauses between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(400),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Pause after the 0-based `attempt` failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt + 1)
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    warn!(attempt = attempt + 1, attempts, error = %error, "generation attempt failed");
                    last_error = Some(error);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.delay_after(attempt)).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("no generation attempt was made"))
            .context(format!("generation failed after {attempts} attempts")))
    }
}
