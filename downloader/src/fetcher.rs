/// The seam between ClipDrop and the external media-download tool.
use async_trait::async_trait;
use clipdrop_shared::{DownloadOptions, FetchError, MediaInfo};

/// A media download backend.
///
/// Given a URL and an options record, an implementation writes the media into
/// `options.workspace` and reports the metadata of what it produced.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Download `url`, waiting for any post-processing to finish.
    async fn fetch(&self, url: &str, options: &DownloadOptions) -> Result<MediaInfo, FetchError>;
}
