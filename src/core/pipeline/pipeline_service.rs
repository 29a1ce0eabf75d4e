// The eligibility and transformation pipeline.
//
// One post is processed start-to-finish before the next is accepted from
// the transport, so the rule and recency stores see no concurrent runs.
// Control flow: restricted-period gate, then the text path (moderation,
// dedup, replacements) and the media path (validity gate), then assembly
// and delivery. Rejections are reported to the source channel; restricted
// periods are silent.

use super::pipeline_models::{IncomingPost, PostOutcome};
use crate::core::calendar::{CalendarLookup, RestrictedPeriodGate};
use crate::core::clock::Clock;
use crate::core::dedup::{DedupService, DedupVerdict, RecencyStore, TOO_SIMILAR_NOTICE};
use crate::core::delivery::{ArtifactUploader, DeliveryService};
use crate::core::media::{AudioToolkit, MediaGate, MediaVerdict, SpeechDetector};
use crate::core::moderation::{
    apply_replacements, ModerationVerdict, Moderator, RuleStore, RulesService,
};
use crate::core::retry::Sleeper;
use crate::core::speech::{SpeechService, SpeechSynthesizer};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info};

/// Capability consumed by the transport layer: hand one post to the
/// pipeline, get its terminal state back.
#[async_trait]
pub trait PostHandler: Send + Sync {
    async fn handle_post(&self, post: IncomingPost) -> PostOutcome;
}

/// Best-effort status reporting back to the source channel.
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn notify(&self, chat_id: i64, text: &str);
}

pub struct Pipeline<C, R, H, T, D, Y, K, U, L>
where
    C: CalendarLookup,
    R: RuleStore,
    H: RecencyStore,
    T: AudioToolkit,
    D: SpeechDetector,
    Y: SpeechSynthesizer,
    K: Clock,
    U: ArtifactUploader,
    L: Sleeper,
{
    restricted: RestrictedPeriodGate<C>,
    moderator: Arc<dyn Moderator>,
    rules: Arc<RulesService<R>>,
    dedup: DedupService<H>,
    media_gate: MediaGate<T, D>,
    speech: SpeechService<Y, T, K>,
    delivery: DeliveryService<U, L>,
    notifier: Arc<dyn StatusNotifier>,
}

impl<C, R, H, T, D, Y, K, U, L> Pipeline<C, R, H, T, D, Y, K, U, L>
where
    C: CalendarLookup,
    R: RuleStore,
    H: RecencyStore,
    T: AudioToolkit,
    D: SpeechDetector,
    Y: SpeechSynthesizer,
    K: Clock,
    U: ArtifactUploader,
    L: Sleeper,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        restricted: RestrictedPeriodGate<C>,
        moderator: Arc<dyn Moderator>,
        rules: Arc<RulesService<R>>,
        dedup: DedupService<H>,
        media_gate: MediaGate<T, D>,
        speech: SpeechService<Y, T, K>,
        delivery: DeliveryService<U, L>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        Self {
            restricted,
            moderator,
            rules,
            dedup,
            media_gate,
            speech,
            delivery,
            notifier,
        }
    }

    async fn reject(&self, post: &IncomingPost, reason: String) -> PostOutcome {
        self.notifier.notify(post.chat_id, &reason).await;
        PostOutcome::Rejected(reason)
    }

    async fn process(&self, post: &IncomingPost) -> PostOutcome {
        if post.text.is_none() && post.media().is_none() {
            return PostOutcome::Ignored;
        }

        if self.restricted.is_restricted().await {
            return PostOutcome::Restricted;
        }

        // Text path: moderation first, on the raw text.
        let mut cleaned: Option<String> = None;
        if let Some(raw) = post.text.as_deref() {
            match self.moderator.moderate(raw).await {
                ModerationVerdict::Accepted(text) => cleaned = Some(text),
                ModerationVerdict::Rejected(reason) => {
                    return self.reject(post, reason.to_string()).await;
                }
            }
        }

        // Media path: validity gate, producing the canonical WAV.
        let mut media_wav = None;
        if let Some(media) = post.media() {
            debug!(
                "Validating {:?} attachment for post {}",
                media.kind, post.post_id
            );
            let wav_out = post.work_dir.join("media.wav");
            match self.media_gate.validate(&media.path, &wav_out).await {
                MediaVerdict::Passed(wav) => media_wav = Some(wav),
                MediaVerdict::Rejected(reason) => {
                    return self.reject(post, reason.to_string()).await;
                }
            }
        }

        // Dedup compares pre-replacement text and commits on acceptance.
        if let Some(text) = cleaned.as_deref() {
            match self.dedup.check_and_commit(text).await {
                Ok(DedupVerdict::Fresh) => {}
                Ok(DedupVerdict::TooSimilar) => {
                    return self.reject(post, TOO_SIMILAR_NOTICE.to_string()).await;
                }
                Err(err) => {
                    error!("Recency store failure: {}", err);
                    return PostOutcome::Failed(err.to_string());
                }
            }
        }

        // Replacements run last on the text path, just before synthesis.
        let rules = self.rules.snapshot().await;
        let spoken = cleaned.map(|text| apply_replacements(&text, &rules.replacements));

        let artifact = match self
            .speech
            .assemble(spoken.as_deref(), media_wav.as_deref(), &post.work_dir)
            .await
        {
            Ok(artifact) => artifact,
            Err(err) => {
                error!("Assembly failed for post {}: {}", post.post_id, err);
                return PostOutcome::Failed(err.to_string());
            }
        };

        match self.delivery.deliver(&artifact).await {
            Ok(response) => {
                info!("Post {} delivered, line answered: {}", post.post_id, response);
                PostOutcome::Delivered
            }
            Err(err) => {
                error!("Delivery failed for post {}: {}", post.post_id, err);
                PostOutcome::Failed(err.to_string())
            }
        }
    }
}

#[async_trait]
impl<C, R, H, T, D, Y, K, U, L> PostHandler for Pipeline<C, R, H, T, D, Y, K, U, L>
where
    C: CalendarLookup,
    R: RuleStore,
    H: RecencyStore,
    T: AudioToolkit,
    D: SpeechDetector,
    Y: SpeechSynthesizer,
    K: Clock,
    U: ArtifactUploader,
    L: Sleeper,
{
    async fn handle_post(&self, post: IncomingPost) -> PostOutcome {
        let outcome = self.process(&post).await;
        // Scratch files (downloads and intermediates) go with the post.
        if post.work_dir.exists() {
            let _ = fs::remove_dir_all(&post.work_dir).await;
        }
        info!("Post {} finished: {:?}", post.post_id, outcome);
        outcome
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::CalendarError;
    use crate::core::dedup::DedupError;
    use crate::core::delivery::{AudioArtifact, DeliveryError};
    use crate::core::media::MediaError;
    use crate::core::moderation::{ModerationError, RuleBasedModerator, RuleSet};
    use crate::core::pipeline::pipeline_models::{MediaKind, MediaRef};
    use crate::core::retry::RetryPolicy;
    use crate::core::speech::{SpeechError, SpeechInput};
    use chrono::{DateTime, TimeZone, Utc};
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tokio::sync::Mutex;

    // ------------------------------------------------------------------
    // Mock ports
    // ------------------------------------------------------------------

    struct FixedCalendar {
        restricted: bool,
    }

    #[async_trait]
    impl CalendarLookup for FixedCalendar {
        async fn is_restricted_now(&self) -> Result<bool, CalendarError> {
            Ok(self.restricted)
        }
    }

    struct MemoryRuleStore {
        rules: Mutex<Option<RuleSet>>,
    }

    #[async_trait]
    impl RuleStore for MemoryRuleStore {
        async fn load(&self) -> Result<Option<RuleSet>, ModerationError> {
            Ok(self.rules.lock().await.clone())
        }

        async fn save(&self, rules: &RuleSet) -> Result<(), ModerationError> {
            *self.rules.lock().await = Some(rules.clone());
            Ok(())
        }
    }

    struct MemoryRecencyStore {
        entries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RecencyStore for MemoryRecencyStore {
        async fn load(&self) -> Result<Vec<String>, DedupError> {
            Ok(self.entries.lock().await.clone())
        }

        async fn save(&self, entries: &[String]) -> Result<(), DedupError> {
            *self.entries.lock().await = entries.to_vec();
            Ok(())
        }
    }

    struct FakeToolkit {
        has_track: bool,
    }

    #[async_trait]
    impl AudioToolkit for FakeToolkit {
        async fn has_audio_track(&self, _input: &Path) -> Result<bool, MediaError> {
            Ok(self.has_track)
        }

        async fn transcode_to_wav(&self, _input: &Path, output: &Path) -> Result<(), MediaError> {
            std::fs::write(output, b"wav").map_err(|e| MediaError::Tool(e.to_string()))
        }

        async fn concat(
            &self,
            _first: &Path,
            _second: &Path,
            output: &Path,
        ) -> Result<(), MediaError> {
            std::fs::write(output, b"combined").map_err(|e| MediaError::Tool(e.to_string()))
        }
    }

    struct FakeDetector {
        speech: bool,
    }

    #[async_trait]
    impl SpeechDetector for FakeDetector {
        async fn contains_speech(&self, _wav: &Path) -> Result<bool, MediaError> {
            Ok(self.speech)
        }
    }

    struct FakeSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for FakeSynthesizer {
        async fn synthesize(&self, _input: &SpeechInput) -> Result<Vec<u8>, SpeechError> {
            Ok(b"speech".to_vec())
        }
    }

    struct FixedClock;

    impl Clock for FixedClock {
        fn now_utc(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 1, 15, 13, 30, 0).unwrap()
        }
    }

    struct RecordingUploader {
        uploads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArtifactUploader for RecordingUploader {
        async fn upload(&self, artifact: &AudioArtifact) -> Result<String, DeliveryError> {
            self.uploads.lock().await.push(artifact.file_name.clone());
            Ok("OK".to_string())
        }
    }

    struct InstantSleeper;

    #[async_trait]
    impl Sleeper for InstantSleeper {
        async fn sleep(&self, _duration: Duration) {}
    }

    struct RecordingNotifier {
        messages: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl StatusNotifier for RecordingNotifier {
        async fn notify(&self, chat_id: i64, text: &str) {
            self.messages.lock().await.push((chat_id, text.to_string()));
        }
    }

    // ------------------------------------------------------------------
    // Harness
    // ------------------------------------------------------------------

    struct Harness {
        pipeline: Pipeline<
            FixedCalendar,
            MemoryRuleStore,
            ArcRecency,
            FakeToolkit,
            FakeDetector,
            FakeSynthesizer,
            FixedClock,
            RecordingUploader,
            InstantSleeper,
        >,
        uploader: Arc<RecordingUploader>,
        notifier: Arc<RecordingNotifier>,
        recency: Arc<MemoryRecencyStore>,
        work: tempfile::TempDir,
    }

    struct HarnessConfig {
        restricted: bool,
        has_track: bool,
        speech: bool,
        rules: RuleSet,
    }

    impl Default for HarnessConfig {
        fn default() -> Self {
            Self {
                restricted: false,
                has_track: true,
                speech: true,
                rules: RuleSet::default(),
            }
        }
    }

    async fn harness(config: HarnessConfig) -> Harness {
        let rules = Arc::new(
            RulesService::init(MemoryRuleStore {
                rules: Mutex::new(Some(config.rules)),
            })
            .await
            .unwrap(),
        );
        let recency = Arc::new(MemoryRecencyStore {
            entries: Mutex::new(Vec::new()),
        });
        let uploader = Arc::new(RecordingUploader {
            uploads: Mutex::new(Vec::new()),
        });
        let notifier = Arc::new(RecordingNotifier {
            messages: Mutex::new(Vec::new()),
        });
        let toolkit = Arc::new(FakeToolkit {
            has_track: config.has_track,
        });

        let pipeline = Pipeline::new(
            RestrictedPeriodGate::new(FixedCalendar {
                restricted: config.restricted,
            }),
            Arc::new(RuleBasedModerator::new(Arc::clone(&rules))),
            Arc::clone(&rules),
            DedupService::new(
                ArcRecency(Arc::clone(&recency)),
                0.55,
                16,
            ),
            MediaGate::new(
                Arc::clone(&toolkit),
                Arc::new(FakeDetector {
                    speech: config.speech,
                }),
            ),
            SpeechService::new(
                Arc::new(FakeSynthesizer),
                Arc::clone(&toolkit),
                Arc::new(FixedClock),
                chrono_tz::Asia::Jerusalem,
                "מבזקים-פלוס".to_string(),
            ),
            DeliveryService::new(
                Arc::clone(&uploader),
                Arc::new(InstantSleeper),
                RetryPolicy::new(5),
            ),
            Arc::clone(&notifier) as Arc<dyn StatusNotifier>,
        );

        Harness {
            pipeline,
            uploader,
            notifier,
            recency,
            work: tempfile::tempdir().unwrap(),
        }
    }

    /// RecencyStore passthrough so the test keeps a handle on the entries.
    struct ArcRecency(Arc<MemoryRecencyStore>);

    #[async_trait]
    impl RecencyStore for ArcRecency {
        async fn load(&self) -> Result<Vec<String>, DedupError> {
            self.0.load().await
        }

        async fn save(&self, entries: &[String]) -> Result<(), DedupError> {
            self.0.save(entries).await
        }
    }

    fn text_post(harness: &Harness, text: &str) -> IncomingPost {
        let work_dir = harness.work.path().join("post");
        std::fs::create_dir_all(&work_dir).unwrap();
        IncomingPost {
            chat_id: -100,
            post_id: 1,
            text: Some(text.to_string()),
            video: None,
            audio_or_voice: None,
            work_dir,
        }
    }

    fn video_post(harness: &Harness, caption: Option<&str>) -> IncomingPost {
        let work_dir = harness.work.path().join("post");
        std::fs::create_dir_all(&work_dir).unwrap();
        let video = work_dir.join("media.mp4");
        std::fs::write(&video, b"mp4").unwrap();
        IncomingPost {
            chat_id: -100,
            post_id: 2,
            text: caption.map(|c| c.to_string()),
            video: Some(MediaRef {
                path: video,
                kind: MediaKind::Video,
            }),
            audio_or_voice: None,
            work_dir,
        }
    }

    // ------------------------------------------------------------------
    // Cases
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn empty_post_is_a_no_op() {
        let harness = harness(HarnessConfig::default()).await;
        let post = IncomingPost {
            chat_id: -100,
            post_id: 0,
            text: None,
            video: None,
            audio_or_voice: None,
            work_dir: PathBuf::from("/nonexistent"),
        };
        assert_eq!(
            harness.pipeline.handle_post(post).await,
            PostOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn accepted_text_is_synthesized_delivered_and_remembered() {
        let harness = harness(HarnessConfig::default()).await;
        let outcome = harness
            .pipeline
            .handle_post(text_post(&harness, "האירוע בוטל"))
            .await;

        assert_eq!(outcome, PostOutcome::Delivered);
        assert_eq!(harness.uploader.uploads.lock().await.len(), 1);
        assert_eq!(
            *harness.recency.entries.lock().await,
            vec!["האירוע בוטל".to_string()]
        );
        assert!(harness.notifier.messages.lock().await.is_empty());
    }

    #[tokio::test]
    async fn restricted_period_silences_everything() {
        let harness = harness(HarnessConfig {
            restricted: true,
            ..Default::default()
        })
        .await;
        let outcome = harness
            .pipeline
            .handle_post(text_post(&harness, "האירוע בוטל"))
            .await;

        assert_eq!(outcome, PostOutcome::Restricted);
        assert!(harness.uploader.uploads.lock().await.is_empty());
        assert!(harness.notifier.messages.lock().await.is_empty());
    }

    #[tokio::test]
    async fn banned_text_is_rejected_with_reason_sent_to_channel() {
        let harness = harness(HarnessConfig {
            rules: RuleSet::stock(),
            ..Default::default()
        })
        .await;
        let outcome = harness
            .pipeline
            .handle_post(text_post(&harness, "כתבה חדשה על טיקטוק"))
            .await;

        assert!(matches!(outcome, PostOutcome::Rejected(_)));
        assert!(harness.uploader.uploads.lock().await.is_empty());
        assert!(harness.recency.entries.lock().await.is_empty());

        let messages = harness.notifier.messages.lock().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, -100);
        assert!(messages[0].1.contains("טיקטוק"));
    }

    #[tokio::test]
    async fn duplicate_text_is_rejected_without_delivery() {
        let harness = harness(HarnessConfig::default()).await;
        harness.recency.save(&["האירוע בוטל".to_string()]).await.unwrap();

        let outcome = harness
            .pipeline
            .handle_post(text_post(&harness, "האירוע בוטל"))
            .await;

        assert_eq!(outcome, PostOutcome::Rejected(TOO_SIMILAR_NOTICE.to_string()));
        assert!(harness.uploader.uploads.lock().await.is_empty());
        assert_eq!(harness.recency.entries.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn soundless_video_is_rejected_with_the_distinct_reason() {
        let harness = harness(HarnessConfig {
            has_track: false,
            ..Default::default()
        })
        .await;
        let outcome = harness.pipeline.handle_post(video_post(&harness, None)).await;

        assert!(matches!(outcome, PostOutcome::Rejected(_)));
        let messages = harness.notifier.messages.lock().await;
        assert!(messages[0].1.contains("וידאו ללא שמע"));
    }

    #[tokio::test]
    async fn musical_video_is_rejected_as_non_speech() {
        let harness = harness(HarnessConfig {
            speech: false,
            ..Default::default()
        })
        .await;
        let outcome = harness.pipeline.handle_post(video_post(&harness, None)).await;

        assert!(matches!(outcome, PostOutcome::Rejected(_)));
        let messages = harness.notifier.messages.lock().await;
        assert!(messages[0].1.contains("דיבור אנושי"));
    }

    #[tokio::test]
    async fn captioned_video_passes_both_paths_and_delivers() {
        let harness = harness(HarnessConfig::default()).await;
        let outcome = harness
            .pipeline
            .handle_post(video_post(&harness, Some("האירוע בוטל")))
            .await;

        assert_eq!(outcome, PostOutcome::Delivered);
        assert_eq!(harness.uploader.uploads.lock().await.len(), 1);
        // The caption went through the text path as well.
        assert_eq!(harness.recency.entries.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn work_dir_is_cleaned_up_after_processing() {
        let harness = harness(HarnessConfig::default()).await;
        let post = text_post(&harness, "האירוע בוטל");
        let work_dir = post.work_dir.clone();
        harness.pipeline.handle_post(post).await;
        assert!(!work_dir.exists());
    }
}
