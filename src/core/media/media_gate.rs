// Media validity gate - decides whether an attachment may reach the line.
//
// Two checks, in order: the file must carry an audio stream at all, and
// that stream must contain human speech (voice activity in at least one
// frame). Probe/transcode/VAD failures all land on the rejecting side -
// a broken analysis never waves media through.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Audio tool error: {0}")]
    Tool(String),

    #[error("Audio analysis error: {0}")]
    Analysis(String),
}

// ============================================================================
// COLLABORATOR TRAITS (PORTS)
// ============================================================================

/// Probing, transcoding and concatenation of audio files. Backed by
/// ffmpeg/ffprobe in the infra layer; the gate and the assembly stage both
/// depend on this port.
#[async_trait]
pub trait AudioToolkit: Send + Sync {
    /// Whether the container holds at least one audio stream.
    async fn has_audio_track(&self, input: &Path) -> Result<bool, MediaError>;

    /// Transcode any input into the canonical mono 8 kHz 16-bit PCM WAV.
    async fn transcode_to_wav(&self, input: &Path, output: &Path) -> Result<(), MediaError>;

    /// Concatenate two audio files, `first` before `second`, into one WAV.
    async fn concat(&self, first: &Path, second: &Path, output: &Path)
        -> Result<(), MediaError>;
}

/// Voice-activity detection over a canonical WAV file.
#[async_trait]
pub trait SpeechDetector: Send + Sync {
    async fn contains_speech(&self, wav: &Path) -> Result<bool, MediaError>;
}

// ============================================================================
// FRAME SCAN
// ============================================================================

/// Nominal VAD frame length.
pub const FRAME_MILLIS: u32 = 30;

/// Walk fixed-duration frames through a classifier, stopping at the first
/// speech-positive frame. A trailing partial frame is ignored. Classifier
/// errors count as silence.
pub fn scan_frames<F>(samples: &[i16], sample_rate: u32, mut classify: F) -> bool
where
    F: FnMut(&[i16]) -> Result<bool, ()>,
{
    let frame_len = (sample_rate as usize * FRAME_MILLIS as usize) / 1000;
    if frame_len == 0 {
        return false;
    }
    for frame in samples.chunks_exact(frame_len) {
        if classify(frame).unwrap_or(false) {
            return true;
        }
    }
    false
}

// ============================================================================
// THE GATE
// ============================================================================

/// Why an attachment was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRejection {
    /// The container has no audio stream at all.
    NoAudioTrack,
    /// There is audio, but no frame registered human speech.
    NotHumanSpeech,
}

impl std::fmt::Display for MediaRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAudioTrack => write!(f, "⛔️ הודעה לא נשלחה: וידאו ללא שמע."),
            Self::NotHumanSpeech => {
                write!(f, "⛔️ הודעה לא נשלחה: שמע אינו דיבור אנושי.")
            }
        }
    }
}

/// Outcome of validating one attachment.
#[derive(Debug, PartialEq)]
pub enum MediaVerdict {
    /// Validated; carries the canonical WAV ready for assembly.
    Passed(PathBuf),
    Rejected(MediaRejection),
}

pub struct MediaGate<T: AudioToolkit, D: SpeechDetector> {
    toolkit: std::sync::Arc<T>,
    detector: std::sync::Arc<D>,
}

impl<T: AudioToolkit, D: SpeechDetector> MediaGate<T, D> {
    pub fn new(toolkit: std::sync::Arc<T>, detector: std::sync::Arc<D>) -> Self {
        Self { toolkit, detector }
    }

    /// Validate a raw media file, writing the canonical WAV to `wav_out`.
    pub async fn validate(&self, raw: &Path, wav_out: &Path) -> MediaVerdict {
        let has_track = match self.toolkit.has_audio_track(raw).await {
            Ok(has_track) => has_track,
            Err(err) => {
                warn!("Audio probe failed, treating as trackless: {}", err);
                false
            }
        };
        if !has_track {
            return MediaVerdict::Rejected(MediaRejection::NoAudioTrack);
        }

        if let Err(err) = self.toolkit.transcode_to_wav(raw, wav_out).await {
            warn!("Transcode failed, treating as speechless: {}", err);
            return MediaVerdict::Rejected(MediaRejection::NotHumanSpeech);
        }

        let speech = match self.detector.contains_speech(wav_out).await {
            Ok(speech) => speech,
            Err(err) => {
                warn!("Speech analysis failed, treating as speechless: {}", err);
                false
            }
        };
        if speech {
            MediaVerdict::Passed(wav_out.to_path_buf())
        } else {
            MediaVerdict::Rejected(MediaRejection::NotHumanSpeech)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FakeToolkit {
        has_track: Result<bool, ()>,
    }

    #[async_trait]
    impl AudioToolkit for FakeToolkit {
        async fn has_audio_track(&self, _input: &Path) -> Result<bool, MediaError> {
            self.has_track
                .map_err(|_| MediaError::Tool("ffprobe exploded".to_string()))
        }

        async fn transcode_to_wav(&self, _input: &Path, _output: &Path) -> Result<(), MediaError> {
            Ok(())
        }

        async fn concat(
            &self,
            _first: &Path,
            _second: &Path,
            _output: &Path,
        ) -> Result<(), MediaError> {
            Ok(())
        }
    }

    struct FakeDetector {
        speech: Result<bool, ()>,
    }

    #[async_trait]
    impl SpeechDetector for FakeDetector {
        async fn contains_speech(&self, _wav: &Path) -> Result<bool, MediaError> {
            self.speech
                .map_err(|_| MediaError::Analysis("bad frame".to_string()))
        }
    }

    fn gate(
        has_track: Result<bool, ()>,
        speech: Result<bool, ()>,
    ) -> MediaGate<FakeToolkit, FakeDetector> {
        MediaGate::new(
            Arc::new(FakeToolkit { has_track }),
            Arc::new(FakeDetector { speech }),
        )
    }

    #[tokio::test]
    async fn missing_audio_stream_is_its_own_rejection() {
        let verdict = gate(Ok(false), Ok(true))
            .validate(Path::new("clip.mp4"), Path::new("clip.wav"))
            .await;
        assert_eq!(verdict, MediaVerdict::Rejected(MediaRejection::NoAudioTrack));
    }

    #[tokio::test]
    async fn background_music_is_rejected_as_non_speech() {
        let verdict = gate(Ok(true), Ok(false))
            .validate(Path::new("clip.mp4"), Path::new("clip.wav"))
            .await;
        assert_eq!(
            verdict,
            MediaVerdict::Rejected(MediaRejection::NotHumanSpeech)
        );
    }

    #[tokio::test]
    async fn speech_bearing_media_passes_with_wav_path() {
        let verdict = gate(Ok(true), Ok(true))
            .validate(Path::new("clip.mp4"), Path::new("clip.wav"))
            .await;
        assert_eq!(verdict, MediaVerdict::Passed(PathBuf::from("clip.wav")));
    }

    #[tokio::test]
    async fn probe_failure_fails_closed() {
        let verdict = gate(Err(()), Ok(true))
            .validate(Path::new("clip.mp4"), Path::new("clip.wav"))
            .await;
        assert_eq!(verdict, MediaVerdict::Rejected(MediaRejection::NoAudioTrack));
    }

    #[tokio::test]
    async fn analysis_failure_fails_closed() {
        let verdict = gate(Ok(true), Err(()))
            .validate(Path::new("clip.mp4"), Path::new("clip.wav"))
            .await;
        assert_eq!(
            verdict,
            MediaVerdict::Rejected(MediaRejection::NotHumanSpeech)
        );
    }

    #[test]
    fn scan_stops_at_first_speech_frame() {
        // 8 kHz, 30 ms frames -> 240 samples per frame.
        let samples = vec![0i16; 240 * 3];
        let mut calls = 0;
        let found = scan_frames(&samples, 8000, |_frame| {
            calls += 1;
            Ok(calls == 2)
        });
        assert!(found);
        assert_eq!(calls, 2);
    }

    #[test]
    fn trailing_partial_frame_is_ignored() {
        let samples = vec![0i16; 240 + 100];
        let mut calls = 0;
        let found = scan_frames(&samples, 8000, |_frame| {
            calls += 1;
            Ok(false)
        });
        assert!(!found);
        assert_eq!(calls, 1);
    }

    #[test]
    fn classifier_errors_count_as_silence() {
        let samples = vec![0i16; 240 * 2];
        let found = scan_frames(&samples, 8000, |_frame| Err(()));
        assert!(!found);
    }
}
