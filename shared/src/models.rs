/// Data model shared across all ClipDrop crates.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{ClipError, ClipResult};

/// Filename template handed to the download tool, relative to the workspace.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Selector used when the capped query matches nothing.
pub const FALLBACK_FORMAT: &str = "best";

// ====== REQUEST ======

/// A validated download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
}

impl DownloadRequest {
    /// Build from the raw form field. Absent, empty and whitespace-only
    /// values are rejected.
    pub fn from_form(url: Option<&str>) -> ClipResult<Self> {
        match url.map(str::trim) {
            Some(url) if !url.is_empty() => Ok(Self { url: url.to_string() }),
            _ => Err(ClipError::MissingInput),
        }
    }
}

// ====== FORMAT POLICY ======

/// Capped-quality format policy, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatPolicy {
    /// Resolution ceiling in pixels of height.
    pub max_height: u32,
    /// Whether a muxer is available to merge separate video and audio.
    pub muxing: bool,
}

impl FormatPolicy {
    pub fn new(max_height: u32, muxing: bool) -> Self {
        Self { max_height, muxing }
    }

    /// Primary selector. Without a muxer only pre-merged streams qualify.
    pub fn primary(&self) -> String {
        let h = self.max_height;
        if self.muxing {
            format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]")
        } else {
            format!("best[height<={h}]")
        }
    }

    /// Single combined stream, no ceiling and no merge.
    pub fn fallback(&self) -> &'static str {
        FALLBACK_FORMAT
    }
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self::new(480, false)
    }
}

// ====== OPTIONS ======

/// Options record consumed by a media fetcher for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Directory every output file must land in.
    pub workspace: PathBuf,
    /// Filename template, relative to `workspace`.
    pub filename_template: String,
    /// Format-selection expression.
    pub format: String,
    /// Suppress diagnostics and warnings.
    pub quiet: bool,
    pub socket_timeout: Duration,
    pub retries: u32,
    /// Explicit muxer location, if one is bundled or installed.
    pub muxer_location: Option<PathBuf>,
    /// Fetch the single item only, never a whole playlist.
    pub no_playlist: bool,
}

impl DownloadOptions {
    pub fn new(workspace: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            format: format.into(),
            quiet: true,
            socket_timeout: Duration::from_secs(30),
            retries: 2,
            muxer_location: None,
            no_playlist: true,
        }
    }

    pub fn with_timeouts(mut self, socket_timeout: Duration, retries: u32) -> Self {
        self.socket_timeout = socket_timeout;
        self.retries = retries;
        self
    }

    pub fn with_muxer(mut self, location: Option<PathBuf>) -> Self {
        self.muxer_location = location;
        self
    }

    /// Same options with a different format selector.
    pub fn with_format(&self, format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..self.clone()
        }
    }

    /// Full output template (workspace joined with the filename template).
    pub fn output_template(&self) -> PathBuf {
        self.workspace.join(&self.filename_template)
    }
}

// ====== METADATA ======

/// Metadata the download tool reports for one finished invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    /// Final location after post-processing, when reported.
    #[serde(default)]
    pub filepath: Option<String>,
    /// Location the tool derived from the template before post-processing.
    #[serde(default, rename = "_filename")]
    pub filename: Option<String>,
}

impl MediaInfo {
    pub fn new(title: impl Into<String>, ext: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ext: Some(ext.into()),
            ..Default::default()
        }
    }

    /// Parse a JSON info document printed by the tool.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Look up a template field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => self.id.as_deref(),
            "title" => self.title.as_deref(),
            "ext" => self.ext.as_deref(),
            _ => None,
        }
    }
}
