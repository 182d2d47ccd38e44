use crate::error::DeviceError;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Backoff schedule for retrying transient device results
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            exponential_backoff: false,
        }
    }

    /// Delay before attempt `retry_count + 1`
    pub fn calculate_delay(&self, retry_count: u32) -> Duration {
        if !self.exponential_backoff {
            return self.base_delay;
        }

        let factor = 2_u32.saturating_pow(retry_count);
        let delay = self.base_delay.saturating_mul(factor);

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }
}

/// Run a device operation, backing off while it reports a transient result.
///
/// Fatal results return immediately. When attempts run out the last transient
/// error is returned so the caller can decide whether to surface it.
pub async fn retry_transient<T, F>(
    operation: &'static str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, DeviceError>
where
    F: FnMut() -> Result<T, DeviceError>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => {
                if attempt > 0 {
                    info!("{} succeeded after {} retries", operation, attempt);
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.calculate_delay(attempt);
                warn!(
                    "{} returned {} (attempt {}/{}), retrying in {:?}",
                    operation,
                    e,
                    attempt + 1,
                    policy.max_attempts,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Poll `condition` every `interval` until it holds or `timeout` elapses.
///
/// Returns the time spent waiting, or the full wait on timeout.
pub async fn wait_until<F>(
    mut condition: F,
    interval: Duration,
    timeout: Duration,
) -> Result<Duration, Duration>
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    loop {
        if condition() {
            return Ok(start.elapsed());
        }
        let waited = start.elapsed();
        if waited >= timeout {
            debug!("Condition not met within {:?}", timeout);
            return Err(waited);
        }
        if interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            sleep(interval).await;
        }
    }
}
