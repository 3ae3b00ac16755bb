//! ffprobe-backed metadata source.

use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

use serde::Deserialize;

use super::discovery::get_ffprobe_path;
use crate::compress::MetadataSource;
use crate::error::AppError;
use crate::plan::VideoInfo;

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    bit_rate: Option<String>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

fn parse_positive_f64(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn parse_bit_rate(s: &str) -> Option<u64> {
    s.trim().parse().ok().filter(|&b: &u64| b > 0)
}

/// Parses `ffprobe -print_format json -show_format -show_streams` output for the first video
/// stream. Bit rate is the stream's own (ffprobe reports "N/A" for some containers); duration
/// prefers the stream and falls back to the container.
pub fn parse_ffprobe_json(json: &str) -> Result<VideoInfo, AppError> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| AppError::metadata(format!("Failed to parse ffprobe JSON: {}", e)))?;

    let video = output
        .streams
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| AppError::metadata("no video stream found"))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        (w, h) => {
            return Err(AppError::metadata(format!(
                "video stream reports no frame size (width={:?}, height={:?})",
                w, h
            )));
        }
    };

    let bit_rate = video.bit_rate.as_deref().and_then(parse_bit_rate);
    let duration = video
        .duration
        .as_deref()
        .and_then(parse_positive_f64)
        .or_else(|| {
            output
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(parse_positive_f64)
        });

    Ok(VideoInfo {
        width,
        height,
        bit_rate,
        duration,
    })
}

/// Runs ffprobe as a child process. Uses the discovered binary unless one is pinned.
#[derive(Debug, Clone, Default)]
pub struct FfprobeSource {
    binary: Option<PathBuf>,
}

impl FfprobeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }
}

impl MetadataSource for FfprobeSource {
    fn probe(&self, path: &Path) -> Result<VideoInfo, AppError> {
        let ffprobe = match &self.binary {
            Some(binary) => binary.as_path(),
            None => get_ffprobe_path()?,
        };
        let path_str = path.to_string_lossy();

        log::debug!(
            target: "vidpress::ffmpeg::ffprobe",
            "probing: ffprobe={}, path={}",
            ffprobe.display(),
            path_str
        );

        let mut cmd = Command::new(ffprobe);
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            &*path_str,
        ]);
        #[cfg(windows)]
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
        let output = cmd
            .output()
            .map_err(|e| AppError::metadata(format!("Failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::metadata(format!("ffprobe failed: {}", stderr.trim())));
        }

        let json = String::from_utf8(output.stdout)
            .map_err(|_| AppError::metadata("ffprobe output was not valid UTF-8"))?;
        let info = parse_ffprobe_json(&json)?;
        log::info!(
            target: "vidpress::ffmpeg::ffprobe",
            "source {}x{}, bit_rate={:?}, duration={:?}",
            info.width,
            info.height,
            info.bit_rate,
            info.duration
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_video_stream_fields() {
        let json = r#"{
            "format": { "duration": "30.5", "size": "12345678", "bit_rate": "3300000" },
            "streams": [
                { "codec_type": "audio", "bit_rate": "128000" },
                {
                    "codec_type": "video",
                    "width": 1920,
                    "height": 1080,
                    "bit_rate": "3100000",
                    "duration": "30.480000"
                }
            ]
        }"#;
        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.bit_rate, Some(3_100_000));
        assert_eq!(info.duration, Some(30.48));
    }

    #[test]
    fn duration_falls_back_to_container() {
        let json = r#"{
            "format": { "duration": "12.0" },
            "streams": [{ "codec_type": "video", "width": 640, "height": 480 }]
        }"#;
        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.duration, Some(12.0));
        assert_eq!(info.bit_rate, None);
    }

    #[test]
    fn unavailable_values_become_none() {
        let json = r#"{
            "format": { "duration": "N/A" },
            "streams": [{
                "codec_type": "video", "width": 640, "height": 480,
                "bit_rate": "N/A", "duration": "0.000000"
            }]
        }"#;
        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.bit_rate, None);
        assert_eq!(info.duration, None);
    }

    #[test]
    fn missing_video_stream_is_metadata_error() {
        let json = r#"{
            "format": { "duration": "10.0" },
            "streams": [{"codec_type": "audio"}]
        }"#;
        let err = parse_ffprobe_json(json).unwrap_err();
        assert!(matches!(err, AppError::Metadata(_)));
        assert!(err.to_string().contains("no video stream"));
    }

    #[test]
    fn empty_output_is_metadata_error() {
        let err = parse_ffprobe_json(r#"{"format": {}, "streams": []}"#).unwrap_err();
        assert!(matches!(err, AppError::Metadata(_)));
        let err = parse_ffprobe_json("{}").unwrap_err();
        assert!(matches!(err, AppError::Metadata(_)));
    }

    #[test]
    fn zero_frame_size_is_metadata_error() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 0, "height": 480}]}"#;
        assert!(matches!(
            parse_ffprobe_json(json),
            Err(AppError::Metadata(_))
        ));
    }

    #[test]
    fn garbage_is_metadata_error() {
        let err = parse_ffprobe_json("not json").unwrap_err();
        assert!(err.to_string().contains("Failed to parse ffprobe JSON"));
    }

    #[test]
    fn missing_binary_is_metadata_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = FfprobeSource::with_binary(dir.path().join("no-such-ffprobe"));
        let err = source.probe(&dir.path().join("clip.mp4")).unwrap_err();
        assert!(matches!(err, AppError::Metadata(_)));
        assert!(err.to_string().contains("Failed to run ffprobe"));
    }
}
