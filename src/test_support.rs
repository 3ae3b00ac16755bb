//! Fakes for unit tests: a manual clock, a scripted encode process, and in-memory
//! probe/engine capabilities.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::compress::{EncodeEngine, EncodeJob, MetadataSource};
use crate::error::AppError;
use crate::monitor::{Clock, EncodeProcess};
use crate::plan::VideoInfo;

/// Clock that only moves on `advance` or `sleep`. Clones share the same time.
#[derive(Clone)]
pub struct FakeClock {
    origin: Instant,
    now: Rc<Cell<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        let origin = Instant::now();
        Self {
            origin,
            now: Rc::new(Cell::new(origin)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.now.get() - self.origin
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Reports "running" for a fixed number of polls, then exits with a scripted result.
pub struct ScriptedProcess {
    running_polls: usize,
    polls: usize,
    exit: Option<(i32, String)>,
    pub waited: usize,
}

impl ScriptedProcess {
    pub fn exiting_after(running_polls: usize) -> Self {
        Self {
            running_polls,
            polls: 0,
            exit: None,
            waited: 0,
        }
    }

    pub fn failing_after(running_polls: usize, code: i32, stderr: &str) -> Self {
        Self {
            exit: Some((code, stderr.to_string())),
            ..Self::exiting_after(running_polls)
        }
    }
}

impl EncodeProcess for ScriptedProcess {
    fn has_exited(&mut self) -> Result<bool, AppError> {
        self.polls += 1;
        Ok(self.polls > self.running_polls)
    }

    fn wait(&mut self) -> Result<(), AppError> {
        self.waited += 1;
        match &self.exit {
            Some((code, stderr)) => Err(AppError::encode_failed(*code, stderr.clone())),
            None => Ok(()),
        }
    }
}

pub struct FakeProbe {
    pub result: Result<VideoInfo, String>,
}

impl FakeProbe {
    pub fn returning(info: VideoInfo) -> Self {
        Self { result: Ok(info) }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

impl MetadataSource for FakeProbe {
    fn probe(&self, _path: &Path) -> Result<VideoInfo, AppError> {
        self.result.clone().map_err(AppError::metadata)
    }
}

/// Writes `output_bytes` bytes to the job's output on start, records every job it was given.
pub struct FakeEngine {
    pub output_bytes: usize,
    pub running_polls: usize,
    pub fail_with: Option<i32>,
    pub refuse_start: bool,
    pub jobs: RefCell<Vec<EncodeJob>>,
}

impl FakeEngine {
    pub fn writing(output_bytes: usize) -> Self {
        Self {
            output_bytes,
            running_polls: 3,
            fail_with: None,
            refuse_start: false,
            jobs: RefCell::new(Vec::new()),
        }
    }
}

impl EncodeEngine for FakeEngine {
    type Process = ScriptedProcess;

    fn start(&self, job: &EncodeJob) -> Result<ScriptedProcess, AppError> {
        if self.refuse_start {
            return Err(AppError::encode_failed(-1, "Failed to spawn FFmpeg: not found"));
        }
        self.jobs.borrow_mut().push(job.clone());
        fs::write(&job.output, vec![0_u8; self.output_bytes])?;
        Ok(match self.fail_with {
            Some(code) => ScriptedProcess::failing_after(self.running_polls, code, "Conversion failed!"),
            None => ScriptedProcess::exiting_after(self.running_polls),
        })
    }
}
