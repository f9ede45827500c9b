/// Response streamer: sends an artifact as an attachment.
///
/// The response body owns the workspace, so the directory is deleted only once
/// the last byte has been read or the body is dropped.
use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::error;

use clipdrop_downloader::{Artifact, Workspace};
use clipdrop_shared::{ClipError, ClipResult};

/// File stream that keeps its workspace alive.
pub struct WorkspaceStream {
    // Dropped first: the file is closed before the directory goes.
    inner: ReaderStream<File>,
    _workspace: Workspace,
}

impl WorkspaceStream {
    pub fn new(file: File, workspace: Workspace) -> Self {
        Self {
            inner: ReaderStream::new(file),
            _workspace: workspace,
        }
    }
}

impl Stream for WorkspaceStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

/// `Content-Disposition` value naming `file_name`.
///
/// Quotes, backslashes, control and non-ASCII characters are replaced in the
/// plain `filename`; non-ASCII names also get an RFC 5987 `filename*`.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    if fallback == file_name {
        format!("attachment; filename=\"{}\"", fallback)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(file_name)
        )
    }
}

/// Build the 200 response for `artifact`, handing `workspace` to the body.
pub async fn artifact_response(workspace: Workspace, artifact: &Artifact) -> ClipResult<Response> {
    let file = File::open(&artifact.path).await.map_err(|e| {
        error!("Cannot open {}: {}", artifact.path.display(), e);
        ClipError::DownloadFailed("Could not open downloaded file".into())
    })?;
    let body = Body::from_stream(WorkspaceStream::new(file, workspace));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, artifact.size.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&artifact.file_name)),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipdrop_downloader::locate_artifact;
    use clipdrop_shared::{DownloadOptions, MediaInfo};

    #[test]
    fn test_plain_ascii_name() {
        assert_eq!(
            content_disposition("My Title.mp4"),
            "attachment; filename=\"My Title.mp4\""
        );
    }

    #[test]
    fn test_quotes_and_newlines_neutralized() {
        let value = content_disposition("a\"b\r\nSet-Cookie: x.mp4");
        assert!(value.starts_with("attachment; filename=\"a_b__Set-Cookie: x.mp4\""));
        assert!(!value.contains('\r') && !value.contains('\n'));
        assert!(value.contains("filename*=UTF-8''a%22b%0D%0ASet-Cookie%3A%20x.mp4"));
    }

    #[test]
    fn test_unicode_name_gets_extended_parameter() {
        let value = content_disposition("Café.mp4");
        assert_eq!(
            value,
            "attachment; filename=\"Caf_.mp4\"; filename*=UTF-8''Caf%C3%A9.mp4"
        );
        assert!(axum::http::HeaderValue::from_str(&value).is_ok());
    }

    #[tokio::test]
    async fn test_body_owns_workspace() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        std::fs::write(ws.path().join("clip.mp4"), b"bytes").unwrap();
        let opts = DownloadOptions::new(ws.path(), "best");
        let artifact = locate_artifact(&opts, &MediaInfo::new("clip", "mp4")).unwrap();

        let response = artifact_response(ws, &artifact).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"bytes");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_body_still_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        std::fs::write(ws.path().join("clip.mp4"), b"bytes").unwrap();
        let opts = DownloadOptions::new(ws.path(), "best");
        let artifact = locate_artifact(&opts, &MediaInfo::new("clip", "mp4")).unwrap();

        let response = artifact_response(ws, &artifact).await.unwrap();
        drop(response);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
