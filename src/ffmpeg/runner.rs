//! FFmpeg process spawning.
//!
//! The child is polled from the caller's thread through [`EncodeProcess`]. Its stderr is drained
//! on a helper thread into a bounded tail buffer so ffmpeg never blocks on a full pipe; the tail
//! becomes the error detail if the encode fails.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

use parking_lot::Mutex;

use super::builder::build_encode_args;
use super::discovery::get_ffmpeg_path;
use super::path_to_string;
use crate::compress::{EncodeEngine, EncodeJob};
use crate::error::AppError;
use crate::monitor::EncodeProcess;

const LOG_TARGET: &str = "vidpress::ffmpeg::runner";

/// Keep only the last N bytes of stderr to avoid unbounded memory growth.
const MAX_STDERR_BYTES: usize = 64 * 1024;

fn drain_stderr<R: Read + Send + 'static>(
    reader: R,
    tail: Arc<Mutex<Vec<u8>>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::with_capacity(256);
        while reader.read_until(b'\n', &mut line).unwrap_or(0) > 0 {
            let mut guard = tail.lock();
            guard.extend_from_slice(&line);
            if guard.len() > MAX_STDERR_BYTES {
                let excess = guard.len() - MAX_STDERR_BYTES;
                guard.drain(..excess);
            }
            drop(guard);
            line.clear();
        }
    })
}

/// Starts ffmpeg encodes. Uses the discovered binary unless one is pinned.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    binary: Option<PathBuf>,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }

    fn binary(&self) -> Result<PathBuf, AppError> {
        match &self.binary {
            Some(path) => Ok(path.clone()),
            None => get_ffmpeg_path().map(PathBuf::from),
        }
    }
}

impl EncodeEngine for FfmpegEngine {
    type Process = FfmpegProcess;

    fn start(&self, job: &EncodeJob) -> Result<FfmpegProcess, AppError> {
        let ffmpeg = self.binary()?;
        let args = build_encode_args(job);

        log::debug!(
            target: LOG_TARGET,
            "Spawning FFmpeg: path={}, input={}, output={}",
            ffmpeg.display(),
            path_to_string(&job.input),
            path_to_string(&job.output)
        );

        let mut cmd = Command::new(&ffmpeg);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::encode_failed(-1, format!("Failed to spawn FFmpeg: {}", e)))?;

        let stderr_tail = Arc::new(Mutex::new(Vec::new()));
        let reader = child
            .stderr
            .take()
            .map(|stderr| drain_stderr(stderr, Arc::clone(&stderr_tail)));

        Ok(FfmpegProcess {
            child,
            stderr_tail,
            reader,
            status: None,
        })
    }
}

/// A running ffmpeg child. Killed on drop if it was never reaped.
pub struct FfmpegProcess {
    child: Child,
    stderr_tail: Arc<Mutex<Vec<u8>>>,
    reader: Option<thread::JoinHandle<()>>,
    status: Option<ExitStatus>,
}

impl FfmpegProcess {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr_tail.lock()).into_owned()
    }
}

impl EncodeProcess for FfmpegProcess {
    fn has_exited(&mut self) -> Result<bool, AppError> {
        if self.status.is_some() {
            return Ok(true);
        }
        let status = self.child.try_wait()?;
        self.status = status;
        Ok(status.is_some())
    }

    fn wait(&mut self) -> Result<(), AppError> {
        let status = match self.status {
            Some(status) => status,
            None => self.child.wait()?,
        };
        self.status = Some(status);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }

        if status.success() {
            log::info!(target: LOG_TARGET, "FFmpeg completed successfully");
            return Ok(());
        }

        let code = status.code().unwrap_or(-1);
        let stderr = self.stderr_text();
        let err_preview = stderr
            .lines()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .join("; ");
        log::error!(
            target: LOG_TARGET,
            "FFmpeg failed (code={}): {}",
            code,
            err_preview
        );
        Err(AppError::encode_failed(code, stderr))
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        if self.status.is_none() {
            log::warn!(target: LOG_TARGET, "Terminating unfinished FFmpeg process {}", self.child.id());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
