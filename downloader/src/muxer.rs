/// Muxer (ffmpeg) discovery.
///
/// Whether a muxer exists decides the format policy, so it is resolved once at
/// startup and handed to the invoker rather than looked up per request.
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[cfg(windows)]
const FFMPEG: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const FFMPEG: &str = "ffmpeg";

/// Resolve the muxer location.
///
/// An explicitly configured path wins (a bundled binary, or a directory
/// holding one). Otherwise PATH is searched, then common install locations.
pub fn resolve_muxer(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        let binary = if path.is_dir() { path.join(FFMPEG) } else { path.to_path_buf() };
        if binary.is_file() {
            ensure_executable(&binary);
            info!("Using configured muxer at {}", path.display());
            return Some(path.to_path_buf());
        }
        warn!("Configured muxer {} does not exist, searching PATH", path.display());
    }

    if let Ok(found) = which::which(FFMPEG) {
        info!("Found muxer on PATH at {}", found.display());
        return Some(found);
    }

    let found = common_locations()
        .into_iter()
        .map(|dir| dir.join(FFMPEG))
        .find(|candidate| candidate.is_file());
    match &found {
        Some(path) => info!("Found muxer at {}", path.display()),
        None => warn!("No muxer found; downloads are limited to pre-merged formats"),
    }
    found
}

fn common_locations() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        [r"C:\ffmpeg\bin", r"C:\Program Files\ffmpeg\bin"]
            .iter()
            .map(PathBuf::from)
            .collect()
    } else {
        [
            "/usr/bin",
            "/usr/local/bin",
            "/snap/bin",
            "/opt/homebrew/bin",
            "/home/linuxbrew/.linuxbrew/bin",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    }
}

/// Make a bundled binary executable. Failures are only logged.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if !path.is_file() {
        return;
    }
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)) {
        warn!("Could not chmod muxer {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
pub fn ensure_executable(_path: &Path) {}
