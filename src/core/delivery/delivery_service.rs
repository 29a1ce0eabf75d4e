// Delivery stage - pushes a finished audio artifact to the telephone line
// host under unreliable network conditions.
//
// At-least-once semantics: attempts are retried with exponential backoff
// until the budget runs out, duplicates are tolerated by the receiving
// system, and exhaustion is surfaced to the caller rather than swallowed.

use crate::core::retry::{RetryPolicy, Sleeper};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// One attempt failed: transport error, non-2xx status, or an
    /// application-level error marker inside a 2xx body.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Terminal: the whole attempt budget is spent.
    #[error("Upload failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

// ============================================================================
// MODELS
// ============================================================================

/// The finished audio payload: canonical mono PCM WAV bytes plus the name
/// the host should see. Owned by this stage until the upload resolves.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub file_name: String,
    pub wav: Vec<u8>,
}

// ============================================================================
// UPLOADER TRAIT (PORT)
// ============================================================================

/// One upload attempt against the external host. Returns the response body
/// on success; every failure mode is an `Err`.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(&self, artifact: &AudioArtifact) -> Result<String, DeliveryError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct DeliveryService<U: ArtifactUploader, S: Sleeper> {
    uploader: Arc<U>,
    sleeper: Arc<S>,
    policy: RetryPolicy,
}

impl<U: ArtifactUploader, S: Sleeper> DeliveryService<U, S> {
    pub fn new(uploader: Arc<U>, sleeper: Arc<S>, policy: RetryPolicy) -> Self {
        Self {
            uploader,
            sleeper,
            policy,
        }
    }

    /// Upload with bounded retry. Ok carries the host's response body.
    pub async fn deliver(&self, artifact: &AudioArtifact) -> Result<String, DeliveryError> {
        let mut last_error = String::new();
        for attempt in 0..self.policy.max_attempts {
            match self.uploader.upload(artifact).await {
                Ok(response) => {
                    info!("Uploaded {} on attempt {}", artifact.file_name, attempt);
                    return Ok(response);
                }
                Err(err) => {
                    last_error = err.to_string();
                    if attempt + 1 < self.policy.max_attempts {
                        let delay = self.policy.delay_for(attempt);
                        warn!(
                            "Upload attempt {} failed ({}), retrying in {:.1}s",
                            attempt,
                            last_error,
                            delay.as_secs_f64()
                        );
                        self.sleeper.sleep(delay).await;
                    }
                }
            }
        }
        Err(DeliveryError::Exhausted {
            attempts: self.policy.max_attempts,
            last: last_error,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    struct FlakyUploader {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl ArtifactUploader for FlakyUploader {
        async fn upload(&self, _artifact: &AudioArtifact) -> Result<String, DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(DeliveryError::Upload(format!("boom on attempt {}", call)))
            } else {
                Ok("OK".to_string())
            }
        }
    }

    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn new() -> Self {
            Self {
                delays: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().await.push(duration);
        }
    }

    fn artifact() -> AudioArtifact {
        AudioArtifact {
            file_name: "announcement.wav".to_string(),
            wav: vec![0u8; 16],
        }
    }

    #[tokio::test]
    async fn success_on_final_attempt_reaches_the_caller() {
        let uploader = Arc::new(FlakyUploader {
            calls: AtomicU32::new(0),
            fail_first: 4,
        });
        let sleeper = Arc::new(RecordingSleeper::new());
        let service = DeliveryService::new(
            Arc::clone(&uploader),
            Arc::clone(&sleeper),
            RetryPolicy::new(5),
        );

        let response = service.deliver(&artifact()).await.unwrap();
        assert_eq!(response, "OK");
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 5);

        // Backoff strictly increases: 2^n + [0,1) never overlaps 2^(n+1).
        let delays = sleeper.delays.lock().await;
        assert_eq!(delays.len(), 4);
        for pair in delays.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[tokio::test]
    async fn exhaustion_is_a_terminal_error() {
        let uploader = Arc::new(FlakyUploader {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        });
        let sleeper = Arc::new(RecordingSleeper::new());
        let service = DeliveryService::new(
            Arc::clone(&uploader),
            Arc::clone(&sleeper),
            RetryPolicy::new(5),
        );

        let err = service.deliver(&artifact()).await.unwrap_err();
        match err {
            DeliveryError::Exhausted { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 5);
        // No sleep after the final attempt.
        assert_eq!(sleeper.delays.lock().await.len(), 4);
    }
}
