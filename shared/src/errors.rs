/// Unified error types for ClipDrop.
use std::path::Path;
use thiserror::Error;

/// Request-level error taxonomy. Every failure the handler can report
/// ends up as one of these.
#[derive(Debug, Error)]
pub enum ClipError {
    #[error("URL is required")]
    MissingInput,

    #[error("{0}")]
    DownloadFailed(String),

    #[error("Download failed: File not found")]
    ArtifactMissing,
}

impl ClipError {
    /// Whether the caller is to blame (4xx) rather than the server (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ClipError::MissingInput)
    }

    /// Strip server-side paths from the cause. Each `(path, replacement)`
    /// pair is applied longest path first, together with its canonical form.
    pub fn redact(self, paths: &[(&Path, &str)]) -> Self {
        match self {
            ClipError::DownloadFailed(message) => ClipError::DownloadFailed(redact_paths(&message, paths)),
            other => other,
        }
    }
}

fn redact_paths(message: &str, paths: &[(&Path, &str)]) -> String {
    let mut forms: Vec<(String, &str)> = Vec::new();
    for &(path, replacement) in paths {
        let canonical = path.canonicalize().ok();
        for form in std::iter::once(path.to_path_buf()).chain(canonical) {
            let form = form.to_string_lossy().to_string();
            if !form.is_empty() && form != "/" {
                forms.push((form, replacement));
            }
        }
    }
    forms.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = message.to_string();
    for (form, replacement) in forms {
        // An erased directory takes its trailing separator with it
        if replacement.is_empty() {
            out = out.replace(&format!("{}{}", form, std::path::MAIN_SEPARATOR), "");
        }
        out = out.replace(&form, replacement);
    }
    out
}

impl From<FetchError> for ClipError {
    fn from(err: FetchError) -> Self {
        ClipError::DownloadFailed(err.to_string())
    }
}

/// Errors reported by a media fetcher (the external download tool).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to start downloader: {0}")]
    Spawn(String),

    #[error("{message}")]
    Failed { message: String },

    #[error("{message}")]
    FormatUnavailable { message: String },

    #[error("Downloader returned invalid metadata: {0}")]
    InvalidOutput(String),
}

impl FetchError {
    /// Classify a failure message printed by the download tool.
    pub fn from_tool_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("requested format is not available")
            || lower.contains("no video formats found")
        {
            FetchError::FormatUnavailable { message }
        } else {
            FetchError::Failed { message }
        }
    }

    /// Whether a less demanding format selector may still succeed.
    pub fn is_format_unavailable(&self) -> bool {
        matches!(self, FetchError::FormatUnavailable { .. })
    }
}

/// Result type alias for request-level operations.
pub type ClipResult<T> = Result<T, ClipError>;
