pub mod compress;
pub mod error;
pub mod ffmpeg;
pub mod logging;
pub mod monitor;
pub mod plan;
#[cfg(test)]
mod test_support;

pub use compress::{CompressRequest, CompressionReport, Compressor, EncodeJob};
pub use error::AppError;
pub use monitor::{Clock, EncodeProcess, MonitorState, ProgressMonitor, ProgressUpdate, SystemClock};
pub use plan::{EncodingPlan, TargetSpec, VideoInfo};
