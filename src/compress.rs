//! Compression pipeline: probe → plan → encode → report.
//!
//! The probe and the encoder are injected so the sequencing can be driven without ffmpeg.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;
use crate::ffmpeg::EncodeSettings;
use crate::monitor::{Clock, EncodeProcess, ProgressMonitor, ProgressUpdate, SystemClock};
use crate::plan::{EncodingPlan, TargetSpec, VideoInfo, plan_encoding};

const LOG_TARGET: &str = "vidpress::compress";

/// Messenger upload limit the compressed file is checked against (2 GiB).
pub const UPLOAD_LIMIT_BYTES: u64 = 2_147_483_648;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Reads stream metadata for one file.
pub trait MetadataSource {
    fn probe(&self, path: &Path) -> Result<VideoInfo, AppError>;
}

/// Starts an external encode for a planned job.
pub trait EncodeEngine {
    type Process: EncodeProcess;

    fn start(&self, job: &EncodeJob) -> Result<Self::Process, AppError>;
}

/// Everything the encoder needs for one run.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub plan: EncodingPlan,
    pub settings: EncodeSettings,
}

#[derive(Debug, Clone)]
pub struct CompressRequest {
    pub input: PathBuf,
    /// Defaults to [`compressed_sibling_path`] of the input.
    pub output: Option<PathBuf>,
    pub target: TargetSpec,
    pub settings: EncodeSettings,
}

impl CompressRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            target: TargetSpec::default(),
            settings: EncodeSettings::default(),
        }
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn target(mut self, target: TargetSpec) -> Self {
        self.target = target;
        self
    }

    pub fn settings(mut self, settings: EncodeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| compressed_sibling_path(&self.input))
    }
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionReport {
    pub input: PathBuf,
    pub output_path: PathBuf,
    pub source: VideoInfo,
    pub plan: EncodingPlan,
    pub original_size: u64,
    pub compressed_size: u64,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CompressionReport {
    /// `(original - compressed) / original * 100`; negative when the output grew, 0 for an empty
    /// original.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        let original = self.original_size as f64;
        (original - self.compressed_size as f64) / original * 100.0
    }

    pub fn original_mib(&self) -> f64 {
        self.original_size as f64 / BYTES_PER_MIB
    }

    pub fn compressed_mib(&self) -> f64 {
        self.compressed_size as f64 / BYTES_PER_MIB
    }

    pub fn fits_upload_limit(&self) -> bool {
        self.compressed_size <= UPLOAD_LIMIT_BYTES
    }
}

fn file_stem_lossy(input: &Path) -> String {
    input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string())
}

/// `<stem>_compressed.mp4` next to the input.
pub fn compressed_sibling_path(input: &Path) -> PathBuf {
    input.with_file_name(format!("{}_compressed.mp4", file_stem_lossy(input)))
}

/// `<dir>/compressed_<label>_<stem>.mp4`.
pub fn labelled_output_path(dir: &Path, label: &str, input: &Path) -> PathBuf {
    dir.join(format!("compressed_{}_{}.mp4", label, file_stem_lossy(input)))
}

fn file_size(path: &Path) -> Result<u64, AppError> {
    Ok(fs::metadata(path)?.len())
}

pub struct Compressor<M, E, C = SystemClock> {
    probe: M,
    engine: E,
    clock: C,
}

impl<M, E> Compressor<M, E, SystemClock>
where
    M: MetadataSource,
    E: EncodeEngine,
{
    pub fn new(probe: M, engine: E) -> Self {
        Self::with_clock(probe, engine, SystemClock)
    }
}

impl<M, E, C> Compressor<M, E, C>
where
    M: MetadataSource,
    E: EncodeEngine,
    C: Clock,
{
    pub fn with_clock(probe: M, engine: E, clock: C) -> Self {
        Self {
            probe,
            engine,
            clock,
        }
    }

    /// Probes and plans without encoding.
    pub fn plan(&self, request: &CompressRequest) -> Result<(VideoInfo, EncodingPlan), AppError> {
        if !request.input.is_file() {
            return Err(AppError::FileNotFound(request.input.clone()).in_step("open input"));
        }
        let source = self
            .probe
            .probe(&request.input)
            .map_err(|e| e.in_step("probe"))?;
        let plan = plan_encoding(&source, &request.target).map_err(|e| e.in_step("plan"))?;
        log::info!(
            target: LOG_TARGET,
            "{}: {}x{} -> {}",
            request.input.display(),
            source.width,
            source.height,
            plan
        );
        Ok((source, plan))
    }

    /// Runs the whole pipeline, feeding `on_progress` while the encode is running. The last
    /// update is always 100%, even when the encode fails.
    pub fn compress(
        &self,
        request: &CompressRequest,
        on_progress: impl FnMut(ProgressUpdate),
    ) -> Result<CompressionReport, AppError> {
        let (source, plan) = self.plan(request)?;

        let output = request.output_path();
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::from(e).in_step("create output directory"))?;
        }
        let original_size = file_size(&request.input).map_err(|e| e.in_step("read input size"))?;

        let job = EncodeJob {
            input: request.input.clone(),
            output: output.clone(),
            plan,
            settings: request.settings.clone(),
        };
        let started_at = self.clock.now();
        let mut process = self.engine.start(&job).map_err(|e| e.in_step("encode"))?;

        let finished = match source
            .usable_duration()
            .and_then(|secs| ProgressMonitor::new(&self.clock, secs))
        {
            Some(mut monitor) => monitor.run(&mut process, on_progress),
            None => {
                log::warn!(
                    target: LOG_TARGET,
                    "Source duration unknown, progress will not be reported"
                );
                process.wait()
            }
        };
        finished.map_err(|e| e.in_step("encode"))?;

        let compressed_size = file_size(&output).map_err(|e| e.in_step("read output size"))?;
        let report = CompressionReport {
            input: request.input.clone(),
            output_path: output,
            source,
            plan,
            original_size,
            compressed_size,
            elapsed: self.clock.now().saturating_duration_since(started_at),
        };
        log::info!(
            target: LOG_TARGET,
            "Compressed {} -> {} ({} -> {} bytes, {:.1}% smaller)",
            report.input.display(),
            report.output_path.display(),
            report.original_size,
            report.compressed_size,
            report.reduction_percent()
        );
        Ok(report)
    }
}
