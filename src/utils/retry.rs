//! Fixed-count retry for operations that yield nothing on failure
//!
//! Used for public IP discovery, where each attempt either produces a value
//! or `None` and the caller decides what exhausting the attempts means.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay between attempts
    pub delay: Duration,
    /// Whether to add up to 25% jitter to each delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(250),
            jitter: true,
        }
    }
}

impl RetryConfig {
    fn delay_for_attempt(&self) -> Duration {
        if !self.jitter {
            return self.delay;
        }
        let spread = self.delay.as_millis() as u64 / 4;
        self.delay + Duration::from_millis(clock_noise(spread))
    }
}

/// Value in `0..=max` taken from the clock's sub-second nanos. Only spreads
/// concurrent retries apart, so it need not be uniform.
fn clock_noise(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or_default();
    nanos % (max + 1)
}

/// Run `operation` until it yields a value or `max_attempts` is reached.
/// Returns `None` only when every attempt yielded `None`.
pub async fn retry_until_some<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
    operation_name: &str,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=config.max_attempts {
        if let Some(value) = operation().await {
            if attempt > 1 {
                debug!(
                    "Operation '{}' succeeded on attempt {}/{}",
                    operation_name, attempt, config.max_attempts
                );
            }
            return Some(value);
        }

        if attempt < config.max_attempts {
            let delay = config.delay_for_attempt();
            warn!(
                "Operation '{}' failed on attempt {}/{}, retrying in {:?}",
                operation_name, attempt, config.max_attempts, delay
            );
            sleep(delay).await;
        } else {
            warn!(
                "Operation '{}' failed after {} attempts",
                operation_name, config.max_attempts
            );
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            delay: Duration::from_millis(1),
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_stops_at_first_value() {
        let calls = AtomicU32::new(0);
        let result = retry_until_some(
            &fast(),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { (n == 2).then_some(n) }
            },
            "test",
        )
        .await;
        assert_eq!(result, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_jittered_delay_stays_within_a_quarter() {
        let config = RetryConfig {
            delay: Duration::from_millis(400),
            ..Default::default()
        };
        for _ in 0..50 {
            let delay = config.delay_for_attempt();
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= Duration::from_millis(500));
        }
        assert_eq!(clock_noise(0), 0);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Option<u32> = retry_until_some(
            &fast(),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { None }
            },
            "test",
        )
        .await;
        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
