// src/fetch/retry.rs
// =============================================================================
// Bounded retries around the single-shot Fetcher.
//
// Only timeouts and refused connections are retried. A 403 or 404 is an
// answer, not a network fault, so it comes back on the first attempt.
// =============================================================================

use super::http::{Fetcher, Response};
use crate::error::RetryError;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// How the pause between attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same pause every time
    Fixed,
    /// Pause doubles after every failed attempt
    Exponential,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: Backoff,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; it is clamped to at least 1
    pub fn new(max_attempts: u32, delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after the `attempt`-th failure (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor)
            }
        }
    }

    /// Fetches `url`, retrying transient failures until the budget runs out
    pub async fn attempt(&self, fetcher: &Fetcher, url: &Url) -> Result<Response, RetryError> {
        let mut attempt = 1;
        loop {
            match fetcher.fetch(url).await {
                Ok(response) => return Ok(response),
                Err(err) if !err.is_transient() => return Err(RetryError::Rejected(err)),
                Err(err) if attempt >= self.max_attempts => {
                    return Err(RetryError::GaveUp { attempts: attempt, last: err });
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    debug!(%url, attempt, ?delay, error = %err, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
