//! Locates the ffmpeg and ffprobe binaries.
//!
//! Order: `FFMPEG_PATH` / `FFPROBE_PATH` override, then the directories on `PATH`, then common
//! install locations. ffprobe is looked for next to the resolved ffmpeg before anything else,
//! since the two ship together. Results are cached for the process lifetime.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::AppError;

const LOG_TARGET: &str = "vidpress::ffmpeg::discovery";

const INSTALL_HINT: &str = "Please install FFmpeg on your system:\n  - macOS: brew install ffmpeg\n  - Linux: sudo apt install ffmpeg\n  - Windows: Download from https://ffmpeg.org/download.html";

static FFMPEG_PATH_CACHE: OnceLock<PathBuf> = OnceLock::new();
static FFPROBE_PATH_CACHE: OnceLock<PathBuf> = OnceLock::new();

fn executable_name(base: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", base)
    } else {
        base.to_string()
    }
}

fn common_dirs() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/opt/homebrew/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/opt/local/bin"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin"),
        ]
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![PathBuf::from("/usr/bin"), PathBuf::from("/usr/local/bin")]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", unix)))]
    {
        vec![]
    }
}

/// First `dir/<name>` that is a regular file, for each dir in a `PATH`-style list.
pub fn search_path_list(name: &str, path_list: &OsStr) -> Option<PathBuf> {
    let file_name = executable_name(name);
    std::env::split_paths(path_list)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

/// ffprobe candidates next to an ffmpeg binary. A platform suffix on ffmpeg
/// (`ffmpeg-x86_64-unknown-linux-gnu`) is tried on ffprobe first.
pub fn ffprobe_siblings(ffmpeg_path: &Path) -> Vec<PathBuf> {
    let Some(dir) = ffmpeg_path.parent() else {
        return Vec::new();
    };
    let suffix = ffmpeg_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix("ffmpeg"))
        .filter(|suffix| !suffix.is_empty());
    let mut siblings = Vec::with_capacity(2);
    if let Some(suffix) = suffix {
        siblings.push(dir.join(executable_name(&format!("ffprobe{}", suffix))));
    }
    siblings.push(dir.join(executable_name("ffprobe")));
    siblings
}

/// Where to look for one binary; each source is consulted in field order.
#[derive(Debug, Default)]
pub struct Lookup {
    pub env_override: Option<OsString>,
    pub preferred: Vec<PathBuf>,
    pub path_list: Option<OsString>,
    pub fallback_dirs: Vec<PathBuf>,
}

impl Lookup {
    fn from_env(override_var: &str) -> Self {
        Self {
            env_override: std::env::var_os(override_var),
            preferred: Vec::new(),
            path_list: std::env::var_os("PATH"),
            fallback_dirs: common_dirs(),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if let Some(raw) = self.env_override.as_ref().filter(|raw| !raw.is_empty()) {
            let path = PathBuf::from(raw);
            if path.is_file() {
                log::debug!(target: LOG_TARGET, "{} from environment: {}", name, path.display());
                return Some(path);
            }
            log::warn!(
                target: LOG_TARGET,
                "{} override {} does not exist, searching elsewhere",
                name,
                path.display()
            );
        }

        if let Some(path) = self.preferred.iter().find(|p| p.is_file()) {
            log::debug!(target: LOG_TARGET, "{} found next to ffmpeg: {}", name, path.display());
            return Some(path.clone());
        }

        if let Some(path) = self
            .path_list
            .as_deref()
            .and_then(|list| search_path_list(name, list))
        {
            log::debug!(target: LOG_TARGET, "{} found in PATH: {}", name, path.display());
            return Some(path);
        }

        let file_name = executable_name(name);
        let found = self
            .fallback_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file());
        if let Some(path) = &found {
            log::debug!(target: LOG_TARGET, "{} found in common path: {}", name, path.display());
        }
        found
    }
}

/// Resolved ffmpeg binary, cached for the process lifetime.
pub fn get_ffmpeg_path() -> Result<&'static Path, AppError> {
    if let Some(path) = FFMPEG_PATH_CACHE.get() {
        return Ok(path.as_path());
    }
    let path = Lookup::from_env("FFMPEG_PATH")
        .resolve("ffmpeg")
        .ok_or_else(|| {
            log::error!(target: LOG_TARGET, "FFmpeg not found in PATH or common locations");
            AppError::FfmpegNotFound(format!("FFmpeg not found. {}", INSTALL_HINT))
        })?;
    Ok(FFMPEG_PATH_CACHE.get_or_init(|| path).as_path())
}

/// Resolved ffprobe binary, cached for the process lifetime.
pub fn get_ffprobe_path() -> Result<&'static Path, AppError> {
    if let Some(path) = FFPROBE_PATH_CACHE.get() {
        return Ok(path.as_path());
    }
    let mut lookup = Lookup::from_env("FFPROBE_PATH");
    if let Ok(ffmpeg) = get_ffmpeg_path() {
        lookup.preferred = ffprobe_siblings(ffmpeg);
    }
    let path = lookup.resolve("ffprobe").ok_or_else(|| {
        log::error!(target: LOG_TARGET, "ffprobe not found next to FFmpeg or in PATH");
        AppError::FfmpegNotFound(format!("ffprobe not found. {}", INSTALL_HINT))
    })?;
    Ok(FFPROBE_PATH_CACHE.get_or_init(|| path).as_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(executable_name(name));
        fs::write(&path, b"").expect("create fake binary");
        path
    }

    #[test]
    fn ffprobe_siblings_for_plain_ffmpeg() {
        let ffmpeg = Path::new("/usr/bin").join(executable_name("ffmpeg"));
        let siblings = ffprobe_siblings(&ffmpeg);
        assert_eq!(siblings, vec![Path::new("/usr/bin").join(executable_name("ffprobe"))]);
    }

    #[test]
    fn ffprobe_siblings_keep_platform_suffix() {
        let ffmpeg = Path::new("/app/bin").join(executable_name("ffmpeg-aarch64-apple-darwin"));
        let siblings = ffprobe_siblings(&ffmpeg);
        assert_eq!(siblings.len(), 2);
        assert_eq!(
            siblings[0],
            Path::new("/app/bin").join(executable_name("ffprobe-aarch64-apple-darwin"))
        );
    }

    #[test]
    fn path_list_is_searched_in_order() {
        let first = tempfile::tempdir().expect("tempdir");
        let second = tempfile::tempdir().expect("tempdir");
        touch(second.path(), "ffmpeg");
        let expected = touch(first.path(), "ffmpeg");
        let list = std::env::join_paths([first.path(), second.path()]).expect("join paths");
        assert_eq!(search_path_list("ffmpeg", &list), Some(expected));
    }

    #[test]
    fn directories_are_not_mistaken_for_binaries() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join(executable_name("ffmpeg"))).expect("mkdir");
        let list = std::env::join_paths([dir.path()]).expect("join paths");
        assert_eq!(search_path_list("ffmpeg", &list), None);
    }

    #[test]
    fn env_override_wins_when_it_exists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let custom = touch(dir.path(), "my-ffmpeg");
        let on_path = touch(dir.path(), "ffmpeg");
        let lookup = Lookup {
            env_override: Some(custom.clone().into_os_string()),
            path_list: Some(std::env::join_paths([dir.path()]).expect("join paths")),
            ..Default::default()
        };
        assert_eq!(lookup.resolve("ffmpeg"), Some(custom));

        let stale = Lookup {
            env_override: Some(dir.path().join("gone").into_os_string()),
            path_list: Some(std::env::join_paths([dir.path()]).expect("join paths")),
            ..Default::default()
        };
        assert_eq!(stale.resolve("ffmpeg"), Some(on_path));
    }

    #[test]
    fn preferred_siblings_beat_path() {
        let bundle = tempfile::tempdir().expect("tempdir");
        let system = tempfile::tempdir().expect("tempdir");
        let sibling = touch(bundle.path(), "ffprobe");
        touch(system.path(), "ffprobe");
        let lookup = Lookup {
            preferred: vec![sibling.clone()],
            path_list: Some(std::env::join_paths([system.path()]).expect("join paths")),
            ..Default::default()
        };
        assert_eq!(lookup.resolve("ffprobe"), Some(sibling));
    }

    #[test]
    fn fallback_dirs_are_last_resort() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fallback = touch(dir.path(), "ffmpeg");
        let lookup = Lookup {
            fallback_dirs: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        assert_eq!(lookup.resolve("ffmpeg"), Some(fallback));
        assert_eq!(Lookup::default().resolve("ffmpeg"), None);
    }
}
