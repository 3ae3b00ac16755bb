mod builder;
pub mod discovery;
pub mod ffprobe;
mod runner;

pub use builder::{build_encode_args, format_args_for_display_multiline};
pub use ffprobe::{FfprobeSource, parse_ffprobe_json};
pub use runner::{FfmpegEngine, FfmpegProcess};

use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Fixed quality/codec parameters passed to every encode. Unset fields fall back to the
/// `effective_*` defaults.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncodeSettings {
    pub codec: Option<String>,
    pub preset: Option<String>,
    pub crf: Option<u32>,
    pub audio_codec: Option<String>,
    /// Audio bitrate in kbps. Default 128.
    pub audio_bitrate: Option<u32>,
    /// Move the moov atom to the front (`-movflags +faststart`). Default true.
    pub faststart: Option<bool>,
}

impl EncodeSettings {
    pub fn effective_codec(&self) -> &str {
        self.codec.as_deref().unwrap_or("libx264")
    }

    pub fn effective_preset(&self) -> &str {
        self.preset.as_deref().unwrap_or("medium")
    }

    pub fn effective_crf(&self) -> u32 {
        self.crf.unwrap_or(23).min(51)
    }

    pub fn effective_audio_codec(&self) -> &str {
        self.audio_codec.as_deref().unwrap_or("aac")
    }

    pub fn effective_audio_bitrate(&self) -> u32 {
        self.audio_bitrate.unwrap_or(128).clamp(32, 320)
    }

    pub fn effective_faststart(&self) -> bool {
        self.faststart.unwrap_or(true)
    }

    /// Fields set in `overrides` win; the rest are kept.
    pub fn overlay(self, overrides: EncodeSettings) -> EncodeSettings {
        EncodeSettings {
            codec: overrides.codec.or(self.codec),
            preset: overrides.preset.or(self.preset),
            crf: overrides.crf.or(self.crf),
            audio_codec: overrides.audio_codec.or(self.audio_codec),
            audio_bitrate: overrides.audio_bitrate.or(self.audio_bitrate),
            faststart: overrides.faststart.or(self.faststart),
        }
    }

    /// Reads settings from a JSON file such as `{"crf": 28, "preset": "slow"}`.
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            AppError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Invalid settings file {}: {}", path.display(), e),
            ))
        })
    }
}

/// Path to string for FFmpeg args or logging.
pub fn path_to_string(path: &(impl AsRef<Path> + ?Sized)) -> String {
    path.as_ref().to_string_lossy().to_string()
}
