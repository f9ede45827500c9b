/// ClipDrop API Server
///
/// Accepts a media URL, downloads it through yt-dlp into a per-request
/// workspace and streams the resulting file back as an attachment.
mod config;
mod routes;
mod stream;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use clipdrop_downloader::{muxer, DownloadInvoker, YtDlp};
use config::Config;

/// Shared application state for all API handlers. Read-only after startup.
pub struct AppState {
    pub invoker: DownloadInvoker,
    pub workspace_root: PathBuf,
    pub frontend_path: PathBuf,
}

/// Build the router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    // CORS, so a separately served frontend can post to /download
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::index))
        .route("/download", post(routes::download_video))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Install the global tracing subscriber. Called once, before anything logs.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "clipdrop_api=info,clipdrop_downloader=info,tower_http=info".into()
            }),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env();
    info!("Configuration: {:?}", config);

    if which::which(&config.ytdlp_bin).is_err() {
        warn!("yt-dlp not found at {:?}; downloads will fail until it is installed", config.ytdlp_bin);
    }

    // Muxer capability is decided once, here
    let muxer = muxer::resolve_muxer(config.ffmpeg_path.as_deref());

    std::fs::create_dir_all(&config.workspace_root)?;

    let invoker = DownloadInvoker::new(
        Arc::new(YtDlp::new(&config.ytdlp_bin)),
        config.max_height,
        muxer,
    )
    .with_timeouts(Duration::from_secs(config.socket_timeout_secs), config.retries);
    info!("Format policy: primary {:?}, fallback {:?}", invoker.policy().primary(), invoker.policy().fallback());

    let state = Arc::new(AppState {
        invoker,
        workspace_root: config.workspace_root.clone(),
        frontend_path: config.frontend_path.clone(),
    });

    let app = router(state);

    // Bind
    let addr = config.bind_addr();
    info!("ClipDrop API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
