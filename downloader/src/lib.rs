/// ClipDrop download engine.
///
/// Runs one download per request inside a private temporary workspace:
/// the invoker drives a `MediaFetcher` (yt-dlp by default), the locator
/// finds the file it produced, and dropping the workspace removes it all.
pub mod fetcher;
pub mod invoker;
pub mod locator;
pub mod muxer;
pub mod workspace;
pub mod ytdlp;

pub use fetcher::MediaFetcher;
pub use invoker::DownloadInvoker;
pub use locator::{locate_artifact, Artifact};
pub use workspace::Workspace;
pub use ytdlp::YtDlp;
