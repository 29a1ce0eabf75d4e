// Model-backed moderation strategy.
//
// Delegates classification and cleanup to an external language-model
// service: the model receives a fixed policy prompt plus the raw post text
// and answers either with a sentinel rejection token or with the cleaned
// text. Interchangeable with the rule-based filter behind the `Moderator`
// capability.
//
// Failure mode differs from the rule-based filter on purpose: any transport
// or service error is a rejection (fail-closed), never a pass-through.

use super::moderation_models::{ModerationRejection, ModerationVerdict};
use super::moderation_service::{ModerationError, Moderator};
use async_trait::async_trait;
use tracing::warn;

/// The answer a compliant model gives for content that must not be spoken.
pub const REJECTED_SENTINEL: &str = "REJECTED";

/// Fixed policy instructions sent with every judgment request.
pub const POLICY_PROMPT: &str = "You moderate short Hebrew news flashes for a \
telephone information line serving a religious audience. Reject any message \
that contains or references immodest content, social-media platforms, \
unapproved links, or unapproved phone numbers. If the message must be \
rejected, answer with exactly the single word REJECTED. Otherwise answer \
with the message text only, cleaned for being read aloud: links, phone \
numbers and emoji removed, whitespace normalized. Never add commentary.";

/// Trait for the judgment call itself (implemented over a chat-completions
/// API in the infra layer).
#[async_trait]
pub trait PolicyModel: Send + Sync {
    /// Send the policy prompt and the text under judgment, return the raw
    /// model answer.
    async fn judge(&self, policy: &str, text: &str) -> Result<String, ModerationError>;
}

/// Moderation strategy that defers to a [`PolicyModel`].
pub struct ModelModerator<P: PolicyModel> {
    model: P,
}

impl<P: PolicyModel> ModelModerator<P> {
    pub fn new(model: P) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<P: PolicyModel> Moderator for ModelModerator<P> {
    async fn moderate(&self, raw_text: &str) -> ModerationVerdict {
        match self.model.judge(POLICY_PROMPT, raw_text).await {
            Ok(answer) => {
                let answer = answer.trim();
                if answer.is_empty() || answer.starts_with(REJECTED_SENTINEL) {
                    ModerationVerdict::Rejected(ModerationRejection::PolicyRejected)
                } else {
                    ModerationVerdict::Accepted(answer.to_string())
                }
            }
            Err(err) => {
                // Fail closed: an unreachable judge never waves traffic through.
                warn!("Policy model unavailable, rejecting message: {}", err);
                ModerationVerdict::Rejected(ModerationRejection::PolicyRejected)
            }
        }
    }
}
