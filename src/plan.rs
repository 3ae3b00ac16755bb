//! Resolution and bitrate planning.
//!
//! Maps a source frame size (and optional source bitrate) to a target encode profile. Everything
//! here is pure; the lookup tables are process-wide constants.

use crate::error::AppError;

const LOG_TARGET: &str = "vidpress::plan";

/// Snapshot of the source stream, taken once per run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Video stream bit rate in bits/sec.
    pub bit_rate: Option<u64>,
    /// Duration in seconds.
    pub duration: Option<f64>,
}

impl VideoInfo {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bit_rate: None,
            duration: None,
        }
    }

    pub fn with_bit_rate(mut self, bit_rate: u64) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Duration usable for progress estimation: positive and finite.
    pub fn usable_duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPreset {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const RESOLUTION_PRESETS: &[ResolutionPreset] = &[
    ResolutionPreset { label: "1080p", width: 1920, height: 1080 },
    ResolutionPreset { label: "720p", width: 1280, height: 720 },
    ResolutionPreset { label: "480p", width: 854, height: 480 },
    ResolutionPreset { label: "360p", width: 640, height: 360 },
    ResolutionPreset { label: "240p", width: 426, height: 240 },
];

/// Bitrate ceiling for frames whose long edge reaches `min_dimension`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitrateTier {
    pub min_dimension: u32,
    pub kbps: u32,
}

/// Sorted by `min_dimension`, ascending.
pub const BITRATE_TIERS: &[BitrateTier] = &[
    BitrateTier { min_dimension: 240, kbps: 250 },
    BitrateTier { min_dimension: 360, kbps: 500 },
    BitrateTier { min_dimension: 480, kbps: 750 },
    BitrateTier { min_dimension: 720, kbps: 1024 },
    BitrateTier { min_dimension: 1080, kbps: 1800 },
];

/// Long-edge buckets for automatic scaling: (exclusive lower bound, long edge to scale towards).
/// The last bucket has no lower bound, so sources under 432px are scaled up.
const AUTO_SCALE_STEPS: &[(u32, u32)] = &[(1280, 1280), (848, 854), (640, 640), (0, 432)];

/// Case-insensitive preset lookup.
pub fn find_preset(label: &str) -> Option<&'static ResolutionPreset> {
    let label = label.trim();
    RESOLUTION_PRESETS
        .iter()
        .find(|p| p.label.eq_ignore_ascii_case(label))
}

/// What the caller asked for. An explicit pair wins over a preset; with neither the planner
/// scales automatically.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetSpec {
    pub preset: Option<String>,
    pub explicit: Option<(u32, u32)>,
    pub preserve_aspect: bool,
}

impl Default for TargetSpec {
    fn default() -> Self {
        Self {
            preset: None,
            explicit: None,
            preserve_aspect: true,
        }
    }
}

impl TargetSpec {
    pub fn auto() -> Self {
        Self::default()
    }

    pub fn preset(label: impl Into<String>) -> Self {
        Self {
            preset: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn explicit(width: u32, height: u32) -> Self {
        Self {
            explicit: Some((width, height)),
            ..Self::default()
        }
    }

    pub fn keep_aspect(mut self, preserve_aspect: bool) -> Self {
        self.preserve_aspect = preserve_aspect;
        self
    }

    /// Short tag for file names: the preset label, `WxH`, or `auto`.
    pub fn label(&self) -> String {
        if let Some((w, h)) = self.explicit {
            return format!("{}x{}", w, h);
        }
        match self.preset.as_deref().and_then(find_preset) {
            Some(preset) => preset.label.to_string(),
            None => "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingPlan {
    pub width: u32,
    pub height: u32,
    /// Bits/sec.
    pub bit_rate: u64,
}

impl EncodingPlan {
    pub fn bit_rate_kbps(&self) -> u64 {
        self.bit_rate / 1024
    }
}

impl std::fmt::Display for EncodingPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} @ {} kbps", self.width, self.height, self.bit_rate_kbps())
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), AppError> {
    if width == 0 || height == 0 {
        return Err(AppError::InvalidDimensions { width, height });
    }
    Ok(())
}

fn round_up_even(value: u64, numerator: u64, denominator: u64) -> u32 {
    // ceil(value * numerator / denominator / 2) * 2
    let halves = (value * numerator).div_ceil(denominator * 2);
    (halves * 2).min(u64::from(u32::MAX - 1)) as u32
}

fn floor_even(value: u64) -> u32 {
    (value.min(u64::from(u32::MAX)) as u32 & !1).max(2)
}

/// Automatic downscale curve on the long edge. Inputs must be non-zero.
pub fn auto_scale(width: u32, height: u32) -> (u32, u32) {
    let long_edge = width.max(height);
    let toward = AUTO_SCALE_STEPS
        .iter()
        .find(|(above, _)| long_edge > *above)
        .map(|&(_, toward)| toward)
        .unwrap_or(432);
    let long = u64::from(long_edge);
    let toward = u64::from(toward);
    (
        round_up_even(u64::from(width), toward, long),
        round_up_even(u64::from(height), toward, long),
    )
}

/// Refits a requested box to the source aspect ratio, shrinking whichever axis would stretch.
fn fit_to_source_aspect(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = (u64::from(source.0), u64::from(source.1));
    let (tw, th) = (u64::from(target.0), u64::from(target.1));
    if sw * th > tw * sh {
        (floor_even(tw), floor_even(tw * sh / sw))
    } else {
        (floor_even(th * sw / sh), floor_even(th))
    }
}

/// Resolves output width/height, both even and positive.
pub fn resolve_dimensions(
    width: u32,
    height: u32,
    target: &TargetSpec,
) -> Result<(u32, u32), AppError> {
    check_dimensions(width, height)?;

    let requested = match (target.explicit, target.preset.as_deref()) {
        (Some((w, h)), _) => {
            check_dimensions(w, h)?;
            Some((w, h))
        }
        (None, Some(label)) => match find_preset(label) {
            Some(preset) => Some((preset.width, preset.height)),
            None => {
                log::warn!(
                    target: LOG_TARGET,
                    "Unknown preset {:?}, falling back to automatic scaling",
                    label
                );
                None
            }
        },
        (None, None) => None,
    };

    let resolved = match requested {
        None => auto_scale(width, height),
        Some(box_size) if target.preserve_aspect => fit_to_source_aspect((width, height), box_size),
        Some((w, h)) => (floor_even(u64::from(w)), floor_even(u64::from(h))),
    };
    log::debug!(
        target: LOG_TARGET,
        "Resolved {}x{} -> {}x{} (requested={:?}, preserve_aspect={})",
        width,
        height,
        resolved.0,
        resolved.1,
        requested,
        target.preserve_aspect
    );
    Ok(resolved)
}

/// Tier bitrate for the target frame, capped by the source bitrate when known.
pub fn resolve_bit_rate(width: u32, height: u32, source_bit_rate: Option<u64>) -> u64 {
    let long_edge = width.max(height);
    let tier = BITRATE_TIERS
        .iter()
        .rev()
        .find(|tier| tier.min_dimension <= long_edge)
        .unwrap_or(&BITRATE_TIERS[0]);
    let tier_bit_rate = u64::from(tier.kbps) * 1024;
    match source_bit_rate.filter(|&b| b > 0) {
        Some(source) => tier_bit_rate.min(source),
        None => tier_bit_rate,
    }
}

pub fn plan_encoding(info: &VideoInfo, target: &TargetSpec) -> Result<EncodingPlan, AppError> {
    let (width, height) = resolve_dimensions(info.width, info.height, target)?;
    let bit_rate = resolve_bit_rate(width, height, info.bit_rate);
    Ok(EncodingPlan {
        width,
        height,
        bit_rate,
    })
}
