// Status notifier - sends rejection reasons back to the source channel.
//
// Best-effort by design: rate limits are retried with the shared backoff
// policy, every other send error is logged and dropped. A failed status
// message never blocks or fails the pipeline.

use crate::core::pipeline::StatusNotifier;
use crate::core::retry::{RetryPolicy, Sleeper};
use crate::telegram::api::{TelegramClient, TelegramError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// The one Telegram call the notifier needs, as a port so tests can watch
/// the retry behavior.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        TelegramClient::send_message(self, chat_id, text).await
    }
}

pub struct TelegramNotifier<M: MessageSender, S: Sleeper> {
    sender: Arc<M>,
    sleeper: Arc<S>,
    policy: RetryPolicy,
}

impl<M: MessageSender, S: Sleeper> TelegramNotifier<M, S> {
    pub fn new(sender: Arc<M>, sleeper: Arc<S>, policy: RetryPolicy) -> Self {
        Self {
            sender,
            sleeper,
            policy,
        }
    }
}

#[async_trait]
impl<M: MessageSender, S: Sleeper> StatusNotifier for TelegramNotifier<M, S> {
    async fn notify(&self, chat_id: i64, text: &str) {
        for attempt in 0..self.policy.max_attempts {
            match self.sender.send_message(chat_id, text).await {
                Ok(()) => return,
                Err(TelegramError::RateLimited) => {
                    if attempt + 1 < self.policy.max_attempts {
                        let delay = self.policy.delay_for(attempt);
                        warn!(
                            "Status send rate limited, retrying in {:.1}s",
                            delay.as_secs_f64()
                        );
                        self.sleeper.sleep(delay).await;
                    }
                }
                Err(err) => {
                    warn!("Dropping status message: {}", err);
                    return;
                }
            }
        }
        warn!("Status message dropped after repeated rate limits");
    }
}
