// Retry policy - exponential backoff with jitter, shared by the delivery
// stage and the outbound notifier. Sleeping goes through a port so tests
// observe delays instead of waiting them out.

use async_trait::async_trait;
use std::time::Duration;

/// Trait for suspending the current task. The real implementation lives in
/// the infra layer; tests record the requested delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Bounded exponential backoff: `2^attempt` seconds plus random jitter in
/// `[0, 1)`, attempt index starting at 0.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = 2f64.powi(attempt as i32);
        Duration::from_secs_f64(base + rand::random::<f64>())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_within_jitter_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 0..5 {
            let delay = policy.delay_for(attempt).as_secs_f64();
            let base = 2f64.powi(attempt as i32);
            assert!(delay >= base, "attempt {} too short: {}", attempt, delay);
            assert!(delay < base + 1.0, "attempt {} too long: {}", attempt, delay);
        }
    }
}
