//! Configuration for client sessions.

use revisor_history::AuthToken;
use std::time::Duration;

/// Settings for a [`ClientSyncSession`](crate::ClientSyncSession).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Credential sent with every request.
    pub token: AuthToken,
    /// How read requests are retried.
    pub retry: RetryConfig,
    /// Upper bound on one read, retries and backoff included.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Default per-request time budget.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a configuration for the given credential.
    pub fn new(token: AuthToken) -> Self {
        Self {
            token,
            retry: RetryConfig::default(),
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry(self, retry: RetryConfig) -> Self {
        Self { retry, ..self }
    }

    /// Replaces the per-request time budget.
    pub fn with_request_timeout(self, request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            ..self
        }
    }
}

/// Exponential backoff for idempotent reads.
///
/// Commits and project creation are never retried: a lost reply would
/// leave the client unsure whether the server applied them.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl RetryConfig {
    /// Allows `attempts` tries in total (at least one), starting at 100ms
    /// and doubling up to 10s, with jitter.
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// A single attempt.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Sets the wait before the first retry.
    pub fn with_initial_delay(self, base_delay: Duration) -> Self {
        Self { base_delay, ..self }
    }

    /// Caps every wait.
    pub fn with_max_delay(self, max_delay: Duration) -> Self {
        Self { max_delay, ..self }
    }

    /// Sets the growth factor between consecutive waits.
    pub fn with_backoff_multiplier(self, multiplier: f64) -> Self {
        Self { multiplier, ..self }
    }

    /// Makes waits deterministic.
    pub fn without_jitter(self) -> Self {
        Self {
            jitter: false,
            ..self
        }
    }

    /// Total number of tries, the first included.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The waits between consecutive tries, one fewer than
    /// [`attempts`](Self::attempts).
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let cap = self.max_delay.as_secs_f64();
        let mut next = self.base_delay.as_secs_f64();
        (1..self.attempts).map(move |_| {
            let wait = next.min(cap);
            next *= self.multiplier;
            if self.jitter {
                // up to 25%
                Duration::from_secs_f64(wait * (1.0 + 0.25 * jitter_fraction()))
            } else {
                Duration::from_secs_f64(wait)
            }
        })
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

fn jitter_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.subsec_nanos());
    f64::from(nanos % 1024) / 1024.0
}
