// Media tooling: ffmpeg subprocess wrapper and the WebRTC VAD detector.

pub mod ffmpeg;
pub mod vad;

pub use ffmpeg::FfmpegToolkit;
pub use vad::WebRtcSpeechDetector;
