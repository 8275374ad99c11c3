//! Exponential backoff with jitter for endpoint calls.
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Randomize each delay by up to a quarter of its length
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::with_max_retries(0)
    }

    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Delay before retry number `retry` (1-indexed). A server supplied `retry-after`
    /// wins when it is reasonable.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(after) = retry_after {
            if after <= Duration::from_secs(60) {
                return after;
            }
        }
        if retry == 0 {
            return Duration::ZERO;
        }

        let factor = 2u32.saturating_pow(retry - 1);
        let delay = self
            .initial_delay
            .saturating_mul(factor)
            .min(self.max_delay);

        if self.jitter {
            let quarter = delay / 4;
            let offset = rand::thread_rng().gen_range(Duration::ZERO..=quarter);
            delay - offset
        } else {
            delay
        }
    }
}
