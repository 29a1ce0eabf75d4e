// Runtime-backed sleeper for the retry policies. Tests use recording
// fakes instead.

use crate::core::retry::Sleeper;
use async_trait::async_trait;
use std::time::Duration;

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
