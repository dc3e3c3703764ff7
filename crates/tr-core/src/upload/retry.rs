//! Fixed-schedule retry for individual upload requests.
//!
//! A schedule is a list of delays. With `n` delays a request is attempted at
//! most `n + 1` times. Every attempt, including the last, goes through the
//! same classification: a retryable failure with a delay left sleeps and
//! tries again, anything else is returned as an error.

use super::transport::TransportError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Delays between attempts when nothing else is configured.
pub const DEFAULT_BACKOFF_MS: [u64; 6] = [100, 500, 1000, 1000, 1000, 1000];

/// Classification of transport failures for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network failure or non-success status; worth another attempt.
    Retryable,
    /// Undecodable response or local I/O failure; retrying cannot help.
    Permanent,
}

/// Ordered waits between attempts of one request. Not exponential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::from_millis(&DEFAULT_BACKOFF_MS)
    }
}

impl BackoffSchedule {
    pub fn from_millis(delays_ms: &[u64]) -> Self {
        Self {
            delays: delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Maximum number of attempts a request gets.
    pub fn attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Run `op` until it succeeds, fails permanently or the schedule runs out.
    pub async fn retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0usize;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(request = label, attempt = attempt + 1, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let delay = match (err.classify(), self.delays.get(attempt)) {
                        (ErrorClass::Retryable, Some(delay)) => *delay,
                        _ => return Err(err),
                    };
                    warn!(
                        request = label,
                        attempt = attempt + 1,
                        max_attempts = self.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
