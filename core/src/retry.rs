use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::client::MailProvider;
use crate::config::RetryConfig;
use crate::errors::ProviderResult;

/// Upper bound on attempts per call: the first try plus one retry
pub const MAX_ATTEMPTS: u32 = 2;

/// Bounded retry applied to provider calls.
///
/// Attempts are clamped to `1..=MAX_ATTEMPTS`. Between attempts the provider is warmed up again so the retry runs on a
/// fresh set of cookies. A failed re-warm counts as that attempt's failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            backoff,
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_ms))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run<T, F, Fut>(&self, provider: &dyn MailProvider, mut op: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut attempt = 1;
        let mut result = op().await;

        while let Err(e) = &result {
            if attempt >= self.max_attempts {
                break;
            }
            warn!(attempt, error = %e, "Provider call failed, re-warming session and retrying");

            if !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
            attempt += 1;

            result = match provider.warm_up().await {
                Ok(()) => op().await,
                Err(warm_err) => Err(warm_err),
            };
        }

        result
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
