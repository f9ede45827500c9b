/// Download invoker: builds the per-request options record and runs the
/// fetcher, falling back to a single best-effort stream when the capped
/// query matches nothing.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use clipdrop_shared::{ClipResult, DownloadOptions, FormatPolicy, MediaInfo};

use crate::fetcher::MediaFetcher;
use crate::workspace::Workspace;

pub struct DownloadInvoker {
    fetcher: Arc<dyn MediaFetcher>,
    policy: FormatPolicy,
    muxer: Option<PathBuf>,
    socket_timeout: Duration,
    retries: u32,
}

impl DownloadInvoker {
    /// The format policy follows the muxer capability: with no muxer the
    /// primary selector never asks for a merge.
    pub fn new(fetcher: Arc<dyn MediaFetcher>, max_height: u32, muxer: Option<PathBuf>) -> Self {
        Self {
            fetcher,
            policy: FormatPolicy::new(max_height, muxer.is_some()),
            muxer,
            socket_timeout: Duration::from_secs(30),
            retries: 2,
        }
    }

    pub fn with_timeouts(mut self, socket_timeout: Duration, retries: u32) -> Self {
        self.socket_timeout = socket_timeout;
        self.retries = retries;
        self
    }

    pub fn policy(&self) -> &FormatPolicy {
        &self.policy
    }

    pub fn muxer(&self) -> Option<&Path> {
        self.muxer.as_deref()
    }

    /// Options for the primary attempt inside `workspace`.
    pub fn options_for(&self, workspace: &Workspace) -> DownloadOptions {
        DownloadOptions::new(workspace.path(), self.policy.primary())
            .with_timeouts(self.socket_timeout, self.retries)
            .with_muxer(self.muxer.clone())
    }

    /// Download `url` into `workspace`. Returns the metadata of the produced
    /// file together with the options of the attempt that produced it.
    pub async fn invoke(&self, url: &str, workspace: &Workspace) -> ClipResult<(MediaInfo, DownloadOptions)> {
        let options = self.options_for(workspace);
        info!(
            "Starting download via {} with format {:?} (muxer: {})",
            self.fetcher.name(),
            options.format,
            if self.muxer.is_some() { "yes" } else { "no" }
        );

        match self.fetcher.fetch(url, &options).await {
            Ok(media) => Ok((media, options)),
            Err(e) if e.is_format_unavailable() && options.format != self.policy.fallback() => {
                warn!("Capped format unavailable ({}), retrying with {:?}", e, self.policy.fallback());
                let retry = options.with_format(self.policy.fallback());
                match self.fetcher.fetch(url, &retry).await {
                    Ok(media) => Ok((media, retry)),
                    Err(e) => {
                        error!("Download error: {}", e);
                        Err(e.into())
                    }
                }
            }
            Err(e) => {
                error!("Download error: {}", e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clipdrop_shared::{ClipError, FetchError};
    use std::sync::Mutex;

    /// Records every format it is asked for; fails the capped query.
    #[derive(Default)]
    struct ScriptedFetcher {
        formats: Mutex<Vec<String>>,
        primary_unavailable: bool,
        always_fail: bool,
    }

    #[async_trait]
    impl MediaFetcher for ScriptedFetcher {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self, _url: &str, options: &DownloadOptions) -> Result<MediaInfo, FetchError> {
            self.formats.lock().unwrap().push(options.format.clone());
            if self.always_fail {
                return Err(FetchError::from_tool_message("ERROR: Unable to download webpage"));
            }
            if self.primary_unavailable && options.format != "best" {
                return Err(FetchError::from_tool_message("ERROR: Requested format is not available"));
            }
            Ok(MediaInfo::new("clip", "mp4"))
        }
    }

    fn root() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[tokio::test]
    async fn test_primary_success_single_attempt() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let invoker = DownloadInvoker::new(fetcher.clone(), 480, Some(PathBuf::from("/opt/ffmpeg")));
        let root = root();
        let ws = Workspace::create(root.path()).unwrap();

        let (media, options) = invoker.invoke("https://example.test/v", &ws).await.unwrap();
        assert_eq!(media.title.as_deref(), Some("clip"));
        assert_eq!(options.muxer_location, Some(PathBuf::from("/opt/ffmpeg")));
        assert_eq!(
            *fetcher.formats.lock().unwrap(),
            vec!["bestvideo[height<=480]+bestaudio/best[height<=480]".to_string()]
        );
    }

    #[tokio::test]
    async fn test_falls_back_when_capped_format_missing() {
        let fetcher = Arc::new(ScriptedFetcher {
            primary_unavailable: true,
            ..Default::default()
        });
        let invoker = DownloadInvoker::new(fetcher.clone(), 480, None);
        let root = root();
        let ws = Workspace::create(root.path()).unwrap();

        let (_, options) = invoker.invoke("https://example.test/v", &ws).await.unwrap();
        assert_eq!(options.format, "best");
        assert_eq!(
            *fetcher.formats.lock().unwrap(),
            vec!["best[height<=480]".to_string(), "best".to_string()]
        );
    }

    #[tokio::test]
    async fn test_other_failures_not_retried() {
        let fetcher = Arc::new(ScriptedFetcher {
            always_fail: true,
            ..Default::default()
        });
        let invoker = DownloadInvoker::new(fetcher.clone(), 480, None);
        let root = root();
        let ws = Workspace::create(root.path()).unwrap();

        let err = invoker.invoke("https://unreachable.test/v", &ws).await.unwrap_err();
        assert!(matches!(err, ClipError::DownloadFailed(ref m) if m.contains("Unable to download webpage")));
        assert_eq!(fetcher.formats.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_options_follow_policy() {
        let invoker = DownloadInvoker::new(Arc::new(ScriptedFetcher::default()), 720, None)
            .with_timeouts(Duration::from_secs(10), 5);
        let root = root();
        let ws = Workspace::create(root.path()).unwrap();

        let opts = invoker.options_for(&ws);
        assert_eq!(opts.workspace, ws.path());
        assert_eq!(opts.format, "best[height<=720]");
        assert_eq!(opts.socket_timeout, Duration::from_secs(10));
        assert_eq!(opts.retries, 5);
        assert!(opts.muxer_location.is_none());
        assert!(!invoker.policy().muxing);
    }
}
