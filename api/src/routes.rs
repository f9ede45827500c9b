/// API route handlers for ClipDrop.
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use clipdrop_downloader::{locate_artifact, Artifact, Workspace};
use clipdrop_shared::{ClipError, ClipResult, DownloadRequest};

use crate::stream;
use crate::AppState;

// ====== REQUEST / RESPONSE TYPES ======

#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    pub url: Option<String>,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Map the error taxonomy onto HTTP.
pub fn error_response(err: &ClipError) -> ApiError {
    if err.is_client_error() {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody { detail: err.to_string() }),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                detail: format!("Error downloading video: {}", err),
            }),
        )
    }
}

// ====== ROUTES ======

/// GET / - Static frontend document
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    tokio::fs::read_to_string(&state.frontend_path)
        .await
        .map(Html)
        .map_err(|e| {
            error!("Failed to read frontend {}: {}", state.frontend_path.display(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    detail: "Frontend not available".into(),
                }),
            )
        })
}

/// POST /download - Fetch a URL and stream the file back
pub async fn download_video(
    State(state): State<Arc<AppState>>,
    form: Result<Form<DownloadForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let url = form.ok().and_then(|Form(body)| body.url);
    let request = DownloadRequest::from_form(url.as_deref()).map_err(|e| {
        warn!("Rejected download request: {}", e);
        error_response(&e)
    })?;

    let span = info_span!("download", request_id = %Uuid::new_v4());
    async move {
        info!("Starting download for URL: {}", request.url);
        serve(&state, &request).await.map_err(|e| error_response(&e))
    }
    .instrument(span)
    .await
}

/// Workspace → invoke → locate → stream. Any early return drops the
/// workspace; on success the response body takes it over.
async fn serve(state: &AppState, request: &DownloadRequest) -> ClipResult<Response> {
    let workspace = Workspace::create(&state.workspace_root).map_err(|e| {
        error!("Could not create workspace under {}: {}", state.workspace_root.display(), e);
        ClipError::DownloadFailed("Could not create workspace".into())
    })?;

    let artifact = match fetch_artifact(state, request, &workspace).await {
        Ok(artifact) => artifact,
        Err(e) => {
            // Full cause stays in the log; the caller gets it without paths
            error!("Download failed for {}: {}", request.url, e);
            let mut paths = vec![(workspace.path(), ""), (state.workspace_root.as_path(), "")];
            if let Some(muxer) = state.invoker.muxer() {
                paths.push((muxer, "ffmpeg"));
            }
            return Err(e.redact(&paths));
        }
    };

    info!("Download successful, serving file: {}", artifact.file_name);
    stream::artifact_response(workspace, &artifact).await
}

async fn fetch_artifact(state: &AppState, request: &DownloadRequest, workspace: &Workspace) -> ClipResult<Artifact> {
    let (media, options) = state.invoker.invoke(&request.url, workspace).await?;
    locate_artifact(&options, &media)
}
