/// Environment-driven configuration for the API server.
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// yt-dlp executable (name on PATH or full path).
    pub ytdlp_bin: PathBuf,
    /// Explicit muxer location; discovered when unset.
    pub ffmpeg_path: Option<PathBuf>,
    /// Static HTML served on `GET /`.
    pub frontend_path: PathBuf,
    /// Parent directory for per-request workspaces.
    pub workspace_root: PathBuf,
    pub max_height: u32,
    pub socket_timeout_secs: u64,
    pub retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ffmpeg_path: None,
            frontend_path: PathBuf::from("static/index.html"),
            workspace_root: std::env::temp_dir(),
            max_height: 480,
            socket_timeout_secs: 30,
            retries: 2,
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset or unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: get("API_HOST").unwrap_or(defaults.host),
            port: parse_or("API_PORT", get("API_PORT"), defaults.port),
            ytdlp_bin: get("YTDLP_BIN").map(PathBuf::from).unwrap_or(defaults.ytdlp_bin),
            ffmpeg_path: get("FFMPEG_PATH").map(PathBuf::from),
            frontend_path: get("FRONTEND_PATH").map(PathBuf::from).unwrap_or(defaults.frontend_path),
            workspace_root: get("WORKSPACE_ROOT").map(PathBuf::from).unwrap_or(defaults.workspace_root),
            max_height: parse_or("MAX_HEIGHT", get("MAX_HEIGHT"), defaults.max_height),
            socket_timeout_secs: parse_or(
                "SOCKET_TIMEOUT_SECS",
                get("SOCKET_TIMEOUT_SECS"),
                defaults.socket_timeout_secs,
            ),
            retries: parse_or("DOWNLOAD_RETRIES", get("DOWNLOAD_RETRIES"), defaults.retries),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value {:?} for {}, using default", raw, key);
            default
        }),
        None => default,
    }
}
