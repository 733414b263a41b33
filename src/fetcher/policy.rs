use std::time::Duration;

/// Linear backoff and attempt caps for the retry-fetcher.
///
/// The numbers are defaults, not protocol: the backend gives no hint about
/// when warm-up finishes, so the fetcher polls with a slowly growing delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first re-attempt.
    pub initial_delay: Duration,
    /// Added to the delay after each re-attempt is scheduled.
    pub step: Duration,
    /// Attempts that may end empty (or transiently failed) before giving up.
    pub max_retries: u32,
    /// Non-transient failures tolerated before giving up.
    pub max_errors: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            step: Duration::from_millis(100),
            max_retries: 50,
            max_errors: 5,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n.max(1);
        self
    }

    pub fn with_max_errors(mut self, n: u32) -> Self {
        self.max_errors = n;
        self
    }

    /// Delay preceding re-attempt number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay.saturating_add(self.step.saturating_mul(retry))
    }

    /// Sum of all delays a fetcher can sleep before hitting the attempt cap.
    pub fn worst_case_wait(&self) -> Duration {
        (0..self.max_retries.saturating_sub(1))
            .map(|n| self.delay_for(n))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_growth() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(200));
        assert_eq!(p.delay_for(9), Duration::from_millis(1_000));
    }

    #[test]
    fn test_worst_case_wait() {
        let p = RetryPolicy::new().with_max_retries(3);
        // Two sleeps between three attempts.
        assert_eq!(p.worst_case_wait(), Duration::from_millis(300));
    }

    #[test]
    fn test_max_retries_at_least_one() {
        assert_eq!(RetryPolicy::new().with_max_retries(0).max_retries, 1);
    }
}
