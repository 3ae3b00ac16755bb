//! Error type shared by the planner, the progress monitor and the ffmpeg adapters.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid dimensions {width}x{height}: both axes must be positive")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Error reading video metadata: {0}")]
    Metadata(String),

    #[error("{}", encode_summary(*code))]
    EncodeFailed { code: i32, stderr: String },

    #[error("{0}")]
    FfmpegNotFound(String),

    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata(message.into())
    }

    pub fn encode_failed(code: i32, stderr: impl Into<String>) -> Self {
        Self::EncodeFailed {
            code,
            stderr: stderr.into(),
        }
    }

    /// Wraps `self` with the name of the pipeline step that produced it.
    pub fn in_step(self, step: &'static str) -> Self {
        Self::Step {
            step,
            source: Box::new(self),
        }
    }

    /// The innermost error, with any step wrappers peeled off.
    pub fn root(&self) -> &AppError {
        let mut current = self;
        while let AppError::Step { source, .. } = current {
            current = source;
        }
        current
    }

    /// Trimmed stderr tail for encode failures, `None` for every other kind.
    pub fn detail(&self) -> Option<&str> {
        match self.root() {
            AppError::EncodeFailed { stderr, .. } => {
                Some(stderr.trim()).filter(|s| !s.is_empty())
            }
            _ => None,
        }
    }
}

/// Exit codes from ffmpeg.c; -1 marks a spawn failure.
fn encode_summary(code: i32) -> String {
    match code {
        -1 => "FFmpeg could not be started.".to_string(),
        1 => "FFmpeg failed.".to_string(),
        69 => "Encoding rate limit exceeded.".to_string(),
        123 | 255 => "Encoding was stopped.".to_string(),
        other => format!("FFmpeg failed (exit code {}).", other),
    }
}
