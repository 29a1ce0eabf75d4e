// Synthesis & assembly - turns cleaned text and validated media audio into
// the final artifact for the line.
//
// Text gets a spoken prefix: the current time in Hebrew words (computed in
// the station's fixed timezone) plus the station identifier. Digit-formatted
// clock times inside the body are rewritten into SSML hints so the engine
// reads them as times, not digit strings.

use crate::core::clock::Clock;
use crate::core::delivery::AudioArtifact;
use crate::core::media::{AudioToolkit, MediaError};
use async_trait::async_trait;
use chrono::Timelike;
use chrono_tz::Tz;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error(transparent)]
    Toolkit(#[from] MediaError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Nothing to assemble: no text and no media")]
    NothingToAssemble,
}

// ============================================================================
// SYNTHESIZER TRAIT (PORT)
// ============================================================================

/// What the synthesis engine receives: plain text, or SSML when the body
/// needed markup hints.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechInput {
    Text(String),
    Ssml(String),
}

/// Black-box text-to-speech: input in, encoded audio bytes out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, input: &SpeechInput) -> Result<Vec<u8>, SpeechError>;
}

// ============================================================================
// TIME WORDS
// ============================================================================

fn hour_word(hour: u32) -> &'static str {
    match hour % 12 {
        1 => "אחת",
        2 => "שתיים",
        3 => "שלוש",
        4 => "ארבע",
        5 => "חמש",
        6 => "שש",
        7 => "שבע",
        8 => "שמונה",
        9 => "תשע",
        10 => "עשר",
        11 => "אחת עשרה",
        _ => "שתים עשרה",
    }
}

/// Time of day as spoken Hebrew. Only the quarter and half hours get a
/// minute fragment; other minutes announce the hour alone.
pub fn time_words(hour: u32, minute: u32) -> String {
    let hour = hour_word(hour);
    match minute {
        15 => format!("{} ורבע", hour),
        30 => format!("{} וחצי", hour),
        _ => hour.to_string(),
    }
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct SpeechService<Y: SpeechSynthesizer, T: AudioToolkit, C: Clock> {
    synthesizer: Arc<Y>,
    toolkit: Arc<T>,
    clock: Arc<C>,
    timezone: Tz,
    station_name: String,
    clock_time: Regex,
}

impl<Y: SpeechSynthesizer, T: AudioToolkit, C: Clock> SpeechService<Y, T, C> {
    pub fn new(
        synthesizer: Arc<Y>,
        toolkit: Arc<T>,
        clock: Arc<C>,
        timezone: Tz,
        station_name: String,
    ) -> Self {
        Self {
            synthesizer,
            toolkit,
            clock,
            timezone,
            station_name,
            clock_time: Regex::new(r"\b(?:[01]?\d|2[0-3]):[0-5]\d\b")
                .expect("built-in clock time pattern"),
        }
    }

    /// Prefix the body with the spoken time-of-day and station identifier.
    pub fn announcement(&self, body: &str) -> String {
        let now = self.clock.now_utc().with_timezone(&self.timezone);
        format!(
            "{} ב{}. {}",
            time_words(now.hour(), now.minute()),
            self.station_name,
            body
        )
    }

    /// Rewrite digit clock times into SSML hints. Text without any stays
    /// plain; text with at least one becomes a full SSML document.
    pub fn mark_clock_times(&self, text: &str) -> SpeechInput {
        if !self.clock_time.is_match(text) {
            return SpeechInput::Text(text.to_string());
        }
        let escaped = xml_escape(text);
        let marked = self.clock_time.replace_all(
            &escaped,
            r#"<say-as interpret-as="time" format="hms24">${0}</say-as>"#,
        );
        SpeechInput::Ssml(format!("<speak>{}</speak>", marked))
    }

    /// Build the final artifact. Exactly one of the three outcomes happens:
    /// speech alone, media alone, or speech concatenated before media.
    pub async fn assemble(
        &self,
        text: Option<&str>,
        media_wav: Option<&Path>,
        work_dir: &Path,
    ) -> Result<AudioArtifact, SpeechError> {
        let speech_wav = match text {
            Some(body) => {
                let input = self.mark_clock_times(&self.announcement(body));
                let encoded = self.synthesizer.synthesize(&input).await?;
                let encoded_path = work_dir.join("speech.mp3");
                fs::write(&encoded_path, &encoded)
                    .await
                    .map_err(|e| SpeechError::Io(e.to_string()))?;
                let wav_path = work_dir.join("speech.wav");
                self.toolkit
                    .transcode_to_wav(&encoded_path, &wav_path)
                    .await?;
                Some(wav_path)
            }
            None => None,
        };

        let final_wav = match (speech_wav, media_wav) {
            (Some(speech), Some(media)) => {
                let combined = work_dir.join("combined.wav");
                self.toolkit.concat(&speech, media, &combined).await?;
                combined
            }
            (Some(speech), None) => speech,
            (None, Some(media)) => media.to_path_buf(),
            (None, None) => return Err(SpeechError::NothingToAssemble),
        };

        let wav = fs::read(&final_wav)
            .await
            .map_err(|e| SpeechError::Io(e.to_string()))?;
        Ok(AudioArtifact {
            file_name: "announcement.wav".to_string(),
            wav,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tokio::sync::Mutex;

    struct FixedClock {
        at: DateTime<Utc>,
    }

    impl Clock for FixedClock {
        fn now_utc(&self) -> DateTime<Utc> {
            self.at
        }
    }

    struct FakeSynthesizer {
        last_input: Mutex<Option<SpeechInput>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynthesizer {
        async fn synthesize(&self, input: &SpeechInput) -> Result<Vec<u8>, SpeechError> {
            *self.last_input.lock().await = Some(input.clone());
            Ok(b"mp3-bytes".to_vec())
        }
    }

    struct FakeToolkit;

    #[async_trait]
    impl AudioToolkit for FakeToolkit {
        async fn has_audio_track(&self, _input: &Path) -> Result<bool, MediaError> {
            Ok(true)
        }

        async fn transcode_to_wav(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
            let data = std::fs::read(input).map_err(|e| MediaError::Tool(e.to_string()))?;
            std::fs::write(output, [b"wav:".as_slice(), &data].concat())
                .map_err(|e| MediaError::Tool(e.to_string()))
        }

        async fn concat(
            &self,
            first: &Path,
            second: &Path,
            output: &Path,
        ) -> Result<(), MediaError> {
            let a = std::fs::read(first).map_err(|e| MediaError::Tool(e.to_string()))?;
            let b = std::fs::read(second).map_err(|e| MediaError::Tool(e.to_string()))?;
            std::fs::write(output, [a, b].concat()).map_err(|e| MediaError::Tool(e.to_string()))
        }
    }

    fn service(at: DateTime<Utc>) -> SpeechService<FakeSynthesizer, FakeToolkit, FixedClock> {
        SpeechService::new(
            Arc::new(FakeSynthesizer {
                last_input: Mutex::new(None),
            }),
            Arc::new(FakeToolkit),
            Arc::new(FixedClock { at }),
            chrono_tz::Asia::Jerusalem,
            "מבזקים-פלוס".to_string(),
        )
    }

    #[test]
    fn hours_and_quarter_marks_speak_in_words() {
        assert_eq!(time_words(15, 30), "שלוש וחצי");
        assert_eq!(time_words(8, 15), "שמונה ורבע");
        assert_eq!(time_words(0, 0), "שתים עשרה");
        assert_eq!(time_words(14, 47), "שתיים");
    }

    #[test]
    fn announcement_uses_station_timezone() {
        // 13:30 UTC is 15:30 in Jerusalem in January (UTC+2).
        let service = service(Utc.with_ymd_and_hms(2024, 1, 15, 13, 30, 0).unwrap());
        assert_eq!(
            service.announcement("האירוע בוטל"),
            "שלוש וחצי במבזקים-פלוס. האירוע בוטל"
        );
    }

    #[test]
    fn body_clock_times_become_ssml_hints() {
        let service = service(Utc::now());
        match service.mark_clock_times("הכביש ייסגר בשעה 14:30 הערב") {
            SpeechInput::Ssml(ssml) => {
                assert!(ssml.starts_with("<speak>"));
                assert!(ssml.contains(
                    r#"<say-as interpret-as="time" format="hms24">14:30</say-as>"#
                ));
            }
            other => panic!("expected SSML, got {:?}", other),
        }
    }

    #[test]
    fn plain_body_stays_plain() {
        let service = service(Utc::now());
        assert_eq!(
            service.mark_clock_times("האירוע בוטל"),
            SpeechInput::Text("האירוע בוטל".to_string())
        );
    }

    #[tokio::test]
    async fn text_only_yields_synthesized_artifact() {
        let work = tempfile::tempdir().unwrap();
        let service = service(Utc.with_ymd_and_hms(2024, 1, 15, 13, 30, 0).unwrap());

        let artifact = service
            .assemble(Some("האירוע בוטל"), None, work.path())
            .await
            .unwrap();
        assert_eq!(artifact.wav, b"wav:mp3-bytes");

        let input = service.synthesizer.last_input.lock().await.clone().unwrap();
        match input {
            SpeechInput::Text(text) => assert!(text.starts_with("שלוש וחצי במבזקים-פלוס.")),
            other => panic!("expected plain text input, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn text_and_media_concatenate_speech_first() {
        let work = tempfile::tempdir().unwrap();
        let media = work.path().join("media.wav");
        std::fs::write(&media, b"MEDIA").unwrap();
        let service = service(Utc.with_ymd_and_hms(2024, 1, 15, 13, 30, 0).unwrap());

        let artifact = service
            .assemble(Some("האירוע בוטל"), Some(&media), work.path())
            .await
            .unwrap();
        assert_eq!(artifact.wav, b"wav:mp3-bytesMEDIA");
    }

    #[tokio::test]
    async fn media_only_passes_through_unchanged() {
        let work = tempfile::tempdir().unwrap();
        let media = work.path().join("media.wav");
        std::fs::write(&media, b"MEDIA").unwrap();
        let service = service(Utc::now());

        let artifact = service.assemble(None, Some(&media), work.path()).await.unwrap();
        assert_eq!(artifact.wav, b"MEDIA");
    }
}
