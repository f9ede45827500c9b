/// Shared types for ClipDrop: the request/option/metadata model and the
/// error taxonomy used by the downloader and the API.
pub mod errors;
pub mod models;

pub use errors::{ClipError, ClipResult, FetchError};
pub use models::{DownloadOptions, DownloadRequest, FormatPolicy, MediaInfo};
