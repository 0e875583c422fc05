use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Retry budget for the startup connection sequence
///
/// Only startup uses this; query and write paths never retry.
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug, Error)]
#[error("Maximum retry attempts exceeded")]
pub struct MaxRetriesExceeded;

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, retries: u32) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max,
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt, without sleeping
    pub fn next_delay(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.current_attempt);
        std::cmp::min(self.initial_delay.saturating_mul(factor), self.max_delay)
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        if self.current_attempt >= self.max_retries {
            return Err(MaxRetriesExceeded);
        }

        let delay = self.next_delay();

        log::warn!(
            "⏳ Retry attempt {} of {} in {:?}",
            self.current_attempt + 1,
            self.max_retries,
            delay
        );

        sleep(delay).await;
        self.current_attempt += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(5), 10);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        backoff.current_attempt = 1;
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        backoff.current_attempt = 2;
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        backoff.current_attempt = 3;
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        backoff.current_attempt = 40;
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let mut backoff = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, 2);
        assert!(backoff.sleep().await.is_ok());
        assert!(backoff.sleep().await.is_ok());
        let err = backoff.sleep().await.unwrap_err();
        assert_eq!(err.to_string(), "Maximum retry attempts exceeded");
        assert_eq!(backoff.attempts(), 2);
    }
}
