//! Retry with exponential backoff and jitter.

use std::time::Duration;

use crate::error::ColloquyError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, failures surface immediately.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Default backoff with a custom attempt budget.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Whether `error` seen on the 1-based `attempt` should be retried.
    pub fn should_retry(&self, error: &ColloquyError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }

    /// Sleep for `backoff` scaled by jitter, returning the next backoff.
    pub async fn wait(&self, backoff: Duration) -> Duration {
        // Jitter: 75%–125% of backoff
        let jitter_factor = 0.75 + (rand_factor() * 0.5);
        tokio::time::sleep(Duration::from_secs_f64(
            backoff.as_secs_f64() * jitter_factor,
        ))
        .await;

        Duration::from_secs_f64(
            (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
        )
    }
}

/// Simple pseudo-random factor [0, 1) without pulling in rand crate.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    let hash = hasher.finish();
    (hash % 10000) as f64 / 10000.0
}
