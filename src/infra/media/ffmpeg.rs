// ffmpeg/ffprobe subprocess wrapper implementing the audio toolkit port.
//
// Canonical output everywhere is mono 8 kHz 16-bit PCM WAV - the form the
// line endpoint and the VAD both expect.

use crate::core::media::{AudioToolkit, MediaError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

pub struct FfmpegToolkit;

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self
    }

    async fn run(command: &mut Command) -> Result<Output, MediaError> {
        let output = command
            .output()
            .await
            .map_err(|e| MediaError::Tool(e.to_string()))?;
        if !output.status.success() {
            return Err(MediaError::Tool(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output)
    }
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioToolkit for FfmpegToolkit {
    async fn has_audio_track(&self, input: &Path) -> Result<bool, MediaError> {
        let output = Self::run(
            Command::new("ffprobe")
                .arg("-i")
                .arg(input)
                .args(["-show_streams", "-select_streams", "a", "-loglevel", "error"]),
        )
        .await?;
        // ffprobe prints stream blocks only when audio streams exist.
        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    async fn transcode_to_wav(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        debug!("Transcoding {} -> {}", input.display(), output.display());
        Self::run(
            Command::new("ffmpeg")
                .arg("-i")
                .arg(input)
                .args(["-ar", "8000", "-ac", "1", "-f", "wav"])
                .arg(output)
                .arg("-y"),
        )
        .await?;
        Ok(())
    }

    async fn concat(
        &self,
        first: &Path,
        second: &Path,
        output: &Path,
    ) -> Result<(), MediaError> {
        debug!(
            "Concatenating {} + {} -> {}",
            first.display(),
            second.display(),
            output.display()
        );
        Self::run(
            Command::new("ffmpeg")
                .arg("-i")
                .arg(first)
                .arg("-i")
                .arg(second)
                .args([
                    "-filter_complex",
                    "[0:a][1:a]concat=n=2:v=0:a=1[out]",
                    "-map",
                    "[out]",
                ])
                .arg(output)
                .arg("-y"),
        )
        .await?;
        Ok(())
    }
}
