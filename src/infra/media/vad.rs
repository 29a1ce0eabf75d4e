// WebRTC voice-activity detector behind the speech-detection port.
//
// Walks 30 ms frames of the canonical WAV through the VAD, stopping at the
// first speech-positive frame. A WAV that is not in a shape the VAD accepts
// (mono, 16-bit, 8/16/32/48 kHz) is re-transcoded first.

use crate::core::media::{scan_frames, AudioToolkit, MediaError, SpeechDetector};
use async_trait::async_trait;
use hound::SampleFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use webrtc_vad::{SampleRate, Vad, VadMode};

pub struct WebRtcSpeechDetector<T: AudioToolkit> {
    toolkit: Arc<T>,
}

impl<T: AudioToolkit> WebRtcSpeechDetector<T> {
    pub fn new(toolkit: Arc<T>) -> Self {
        Self { toolkit }
    }

    fn is_vad_compatible(wav: &Path) -> Result<bool, MediaError> {
        let reader =
            hound::WavReader::open(wav).map_err(|e| MediaError::Analysis(e.to_string()))?;
        let spec = reader.spec();
        Ok(spec.channels == 1
            && spec.bits_per_sample == 16
            && spec.sample_format == SampleFormat::Int
            && vad_rate(spec.sample_rate).is_some())
    }
}

fn vad_rate(sample_rate: u32) -> Option<SampleRate> {
    match sample_rate {
        8000 => Some(SampleRate::Rate8kHz),
        16000 => Some(SampleRate::Rate16kHz),
        32000 => Some(SampleRate::Rate32kHz),
        48000 => Some(SampleRate::Rate48kHz),
        _ => None,
    }
}

fn scan_wav(path: PathBuf) -> Result<bool, MediaError> {
    let mut reader =
        hound::WavReader::open(&path).map_err(|e| MediaError::Analysis(e.to_string()))?;
    let spec = reader.spec();
    let rate = vad_rate(spec.sample_rate)
        .ok_or_else(|| MediaError::Analysis(format!("unsupported rate {}", spec.sample_rate)))?;

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<_, _>>()
        .map_err(|e| MediaError::Analysis(e.to_string()))?;

    let mut vad = Vad::new_with_rate_and_mode(rate, VadMode::LowBitrate);
    Ok(scan_frames(&samples, spec.sample_rate, |frame| {
        vad.is_voice_segment(frame)
    }))
}

#[async_trait]
impl<T: AudioToolkit> SpeechDetector for WebRtcSpeechDetector<T> {
    async fn contains_speech(&self, wav: &Path) -> Result<bool, MediaError> {
        let target = if Self::is_vad_compatible(wav)? {
            wav.to_path_buf()
        } else {
            let canonical = wav.with_extension("vad.wav");
            self.toolkit.transcode_to_wav(wav, &canonical).await?;
            canonical
        };

        // The VAD is a blocking FFI scan; keep it off the async threads.
        tokio::task::spawn_blocking(move || scan_wav(target))
            .await
            .map_err(|e| MediaError::Analysis(e.to_string()))?
    }
}
