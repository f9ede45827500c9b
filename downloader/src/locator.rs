/// Artifact locator.
///
/// The tool may rewrite the title or the extension it was given, so the
/// produced file is found from the metadata of this invocation and then
/// confirmed on disk.
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use clipdrop_shared::{ClipError, ClipResult, DownloadOptions, MediaInfo};

/// Placeholder for template fields the metadata does not carry.
const MISSING_FIELD: &str = "NA";

/// A produced file, confirmed to exist inside its workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// On-disk basename.
    pub file_name: String,
    pub size: u64,
}

/// Render a `%(field)s` filename template from metadata.
///
/// Field values have path separators and NUL replaced the way yt-dlp does,
/// so a title can never name a directory.
pub fn prepare_filename(template: &str, media: &MediaInfo) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        if let Some(after) = tail.strip_prefix("%%") {
            out.push('%');
            rest = after;
            continue;
        }

        let field = tail
            .strip_prefix("%(")
            .and_then(|t| t.find(")s").map(|end| (&t[..end], &t[end + 2..])));
        match field {
            Some((name, after)) => {
                out.push_str(&sanitize(media.field(name).unwrap_or(MISSING_FIELD)));
                rest = after;
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '\0')
        .map(|c| match c {
            '/' => '\u{29F8}',
            '\\' if cfg!(windows) => '\u{29F9}',
            c => c,
        })
        .collect()
}

/// Candidate paths in order of trust: the post-processed location, the
/// pre-processing location, then the template rendered from metadata.
fn candidates(options: &DownloadOptions, media: &MediaInfo) -> Vec<PathBuf> {
    let workspace = &options.workspace;
    let mut paths: Vec<PathBuf> = [media.filepath.as_deref(), media.filename.as_deref()]
        .into_iter()
        .flatten()
        .map(|p| workspace.join(p))
        .collect();
    paths.push(workspace.join(prepare_filename(&options.filename_template, media)));
    paths
}

/// Confirm `path` is a regular file that lives inside `workspace`.
fn confirm(workspace: &Path, path: &Path) -> Option<Artifact> {
    let root = workspace.canonicalize().ok()?;
    let real = path.canonicalize().ok()?;
    if !real.starts_with(&root) {
        debug!("Rejecting {} outside workspace", real.display());
        return None;
    }

    let meta = std::fs::metadata(&real).ok()?;
    if !meta.is_file() {
        return None;
    }

    let file_name = real.file_name()?.to_string_lossy().to_string();
    Some(Artifact {
        path: real,
        file_name,
        size: meta.len(),
    })
}

/// Find the file produced by the attempt described by `options`.
pub fn locate_artifact(options: &DownloadOptions, media: &MediaInfo) -> ClipResult<Artifact> {
    let found = candidates(options, media)
        .iter()
        .find_map(|path| confirm(&options.workspace, path));

    match found {
        Some(artifact) => {
            debug!("Located artifact {} ({} bytes)", artifact.file_name, artifact.size);
            Ok(artifact)
        }
        None => {
            error!("Downloaded file not found");
            Err(ClipError::ArtifactMissing)
        }
    }
}
