#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use vidpress_core::compress::{EncodeEngine, MetadataSource};
use vidpress_core::{AppError, Clock, EncodeJob, EncodeProcess, VideoInfo};

/// Manual clock; `sleep` advances it instead of blocking.
#[derive(Default)]
pub struct ManualClock {
    origin: Cell<Option<Instant>>,
    offset: Cell<Duration>,
}

impl ManualClock {
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    fn origin(&self) -> Instant {
        match self.origin.get() {
            Some(origin) => origin,
            None => {
                let origin = Instant::now();
                self.origin.set(Some(origin));
                origin
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin() + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
    }
}

/// Running for `running_polls` liveness checks, then exits with `exit_code`.
pub struct PolledProcess {
    pub running_polls: usize,
    pub polls: usize,
    pub exit_code: i32,
}

impl EncodeProcess for PolledProcess {
    fn has_exited(&mut self) -> Result<bool, AppError> {
        self.polls += 1;
        Ok(self.polls > self.running_polls)
    }

    fn wait(&mut self) -> Result<(), AppError> {
        match self.exit_code {
            0 => Ok(()),
            code => Err(AppError::encode_failed(code, "Error while encoding")),
        }
    }
}

pub struct StaticProbe(pub VideoInfo);

impl MetadataSource for StaticProbe {
    fn probe(&self, _path: &Path) -> Result<VideoInfo, AppError> {
        Ok(self.0.clone())
    }
}

/// Encoder that shrinks the input to `ratio` of its size and records the jobs it ran.
pub struct ShrinkingEngine {
    pub ratio: f64,
    pub running_polls: usize,
    pub exit_code: i32,
    pub jobs: RefCell<Vec<EncodeJob>>,
}

impl ShrinkingEngine {
    pub fn new(ratio: f64, running_polls: usize) -> Self {
        Self {
            ratio,
            running_polls,
            exit_code: 0,
            jobs: RefCell::new(Vec::new()),
        }
    }
}

impl EncodeEngine for ShrinkingEngine {
    type Process = PolledProcess;

    fn start(&self, job: &EncodeJob) -> Result<PolledProcess, AppError> {
        let input_len = fs::metadata(&job.input)?.len();
        let output_len = (input_len as f64 * self.ratio) as usize;
        fs::write(&job.output, vec![0_u8; output_len])?;
        self.jobs.borrow_mut().push(job.clone());
        Ok(PolledProcess {
            running_polls: self.running_polls,
            polls: 0,
            exit_code: self.exit_code,
        })
    }
}

/// Finds FFmpeg via FFMPEG_PATH env or `which`/`where`, sets FFMPEG_PATH for the process, and
/// returns its path.
pub fn find_ffmpeg_and_set_env() -> PathBuf {
    let path = std::env::var("FFMPEG_PATH")
        .ok()
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .or_else(|| {
            let cmd = if cfg!(windows) { "where" } else { "which" };
            let output = Command::new(cmd).arg("ffmpeg").output().ok()?;
            if !output.status.success() {
                return None;
            }
            let first = std::str::from_utf8(&output.stdout)
                .ok()?
                .lines()
                .next()?
                .trim()
                .to_string();
            (!first.is_empty()).then(|| PathBuf::from(first))
        })
        .expect("FFmpeg not found; set FFMPEG_PATH or add to PATH");
    // SAFETY: callers are #[serial]; no other test thread touches the environment meanwhile.
    unsafe {
        std::env::set_var("FFMPEG_PATH", &path);
    }
    path
}

/// Short lavfi test pattern with a sine track, encoded with libx264.
pub fn create_test_video(
    ffmpeg: &Path,
    output_path: &Path,
    size: &str,
    duration_secs: f32,
) -> std::io::Result<ExitStatus> {
    Command::new(ffmpeg)
        .args([
            "-loglevel",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            &format!("testsrc=duration={}:size={}:rate=30", duration_secs, size),
            "-f",
            "lavfi",
            "-i",
            &format!("sine=frequency=440:duration={}", duration_secs),
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-shortest",
            output_path.to_string_lossy().as_ref(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
}
