/// yt-dlp subprocess backend.
///
/// Runs the `yt-dlp` executable once per fetch, inside the workspace.
/// The final info dict is printed as a JSON line on stdout after the file has
/// been moved into place; stderr is forwarded to tracing logs.
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use clipdrop_shared::{DownloadOptions, FetchError, MediaInfo};

use crate::fetcher::MediaFetcher;

/// Print the full info dict once post-processing has moved the file.
const PRINT_INFO: &str = "after_move:%()j";

/// Media fetcher backed by the yt-dlp command line.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// Translate an options record into yt-dlp arguments.
///
/// The URL always follows `--` so it can never be read as an option.
pub fn build_args(url: &str, options: &DownloadOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--ignore-config".into(),
        "--no-simulate".into(),
        "--no-progress".into(),
        "-o".into(),
        options.output_template().into_os_string(),
        "-f".into(),
        options.format.clone().into(),
        "--socket-timeout".into(),
        options.socket_timeout.as_secs().to_string().into(),
        "--retries".into(),
        options.retries.to_string().into(),
        "--print".into(),
        PRINT_INFO.into(),
    ];

    if options.quiet {
        args.push("--quiet".into());
        args.push("--no-warnings".into());
    }
    if options.no_playlist {
        args.push("--no-playlist".into());
    }
    if let Some(location) = &options.muxer_location {
        args.push("--ffmpeg-location".into());
        args.push(location.clone().into_os_string());
    }

    args.push("--".into());
    args.push(url.into());
    args
}

/// Pick the info dict out of yt-dlp's stdout. The last JSON line wins.
pub fn parse_info(stdout: &str) -> Result<MediaInfo, FetchError> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| MediaInfo::from_json(line).ok())
        .ok_or_else(|| FetchError::InvalidOutput("no info JSON on stdout".into()))
}

/// Choose the message to report for a failed run: the last `ERROR:` line,
/// else the last `WARNING:` line, else the exit status.
fn failure_message(error_lines: &[String], warning_lines: &[String], status: ExitStatus) -> String {
    error_lines
        .last()
        .or_else(|| warning_lines.last())
        .cloned()
        .unwrap_or_else(|| format!("yt-dlp exited with {}", status))
}

#[async_trait]
impl MediaFetcher for YtDlp {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch(&self, url: &str, options: &DownloadOptions) -> Result<MediaInfo, FetchError> {
        let args = build_args(url, options);
        debug!("Running {:?} with format {:?}", self.binary, options.format);

        // kill_on_drop: an abandoned request takes the child down with it.
        let mut child = Command::new(&self.binary)
            .args(&args)
            .current_dir(&options.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Spawn(e.to_string()))?;

        let stdout = child.stdout.take()
            .ok_or_else(|| FetchError::Spawn("No stdout handle".into()))?;
        let stderr = child.stderr.take()
            .ok_or_else(|| FetchError::Spawn("No stderr handle".into()))?;

        let read_stdout = async move {
            let mut out = String::new();
            BufReader::new(stdout).read_to_string(&mut out).await.map(|_| out)
        };

        // Forward stderr to tracing, remembering ERROR and WARNING lines
        let read_stderr = async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut errors = Vec::new();
            let mut warnings = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                debug!(target: "yt_dlp", "{}", line);
                if line.starts_with("ERROR:") {
                    errors.push(line);
                } else if line.starts_with("WARNING:") {
                    warnings.push(line);
                }
            }
            (errors, warnings)
        };

        let (stdout, (error_lines, warning_lines)) = tokio::join!(read_stdout, read_stderr);
        let status = child.wait().await
            .map_err(|e| FetchError::Failed { message: format!("Failed waiting for yt-dlp: {}", e) })?;

        if !status.success() {
            let message = failure_message(&error_lines, &warning_lines, status);
            return Err(FetchError::from_tool_message(message));
        }

        let stdout = stdout.map_err(|e| FetchError::InvalidOutput(e.to_string()))?;
        let media = parse_info(&stdout)?;
        info!(
            "yt-dlp finished: title={:?} ext={:?}",
            media.title.as_deref().unwrap_or("NA"),
            media.ext.as_deref().unwrap_or("NA")
        );
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn args_as_strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn test_args_carry_policy() {
        let opts = DownloadOptions::new("/tmp/ws", "best[height<=480]")
            .with_timeouts(Duration::from_secs(30), 2);
        let args = args_as_strings(&build_args("https://example.test/v", &opts));

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-o") + 1], "/tmp/ws/%(title)s.%(ext)s");
        assert_eq!(args[pos("-f") + 1], "best[height<=480]");
        assert_eq!(args[pos("--socket-timeout") + 1], "30");
        assert_eq!(args[pos("--retries") + 1], "2");
        assert!(args.contains(&"--quiet".to_string()));
        assert!(args.contains(&"--no-warnings".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"--ffmpeg-location".to_string()));
    }

    #[test]
    fn test_args_pass_muxer_location() {
        let opts = DownloadOptions::new("/tmp/ws", "best")
            .with_muxer(Some(PathBuf::from("/opt/bin/ffmpeg")));
        let args = args_as_strings(&build_args("https://example.test/v", &opts));
        let pos = args.iter().position(|a| a == "--ffmpeg-location").unwrap();
        assert_eq!(args[pos + 1], "/opt/bin/ffmpeg");
    }

    #[test]
    fn test_url_never_parsed_as_option() {
        let opts = DownloadOptions::new("/tmp/ws", "best");
        let args = args_as_strings(&build_args("--exec=rm -rf /", &opts));
        let n = args.len();
        assert_eq!(args[n - 2], "--");
        assert_eq!(args[n - 1], "--exec=rm -rf /");
    }

    #[test]
    fn test_parse_info_takes_last_json_line() {
        let stdout = "some noise\n{\"title\":\"First\",\"ext\":\"webm\"}\n{\"title\":\"My Title\",\"ext\":\"mp4\",\"filepath\":\"/tmp/ws/My Title.mp4\"}\n";
        let info = parse_info(stdout).unwrap();
        assert_eq!(info.title.as_deref(), Some("My Title"));
        assert_eq!(info.filepath.as_deref(), Some("/tmp/ws/My Title.mp4"));
    }

    #[test]
    fn test_parse_info_rejects_empty_output() {
        assert!(matches!(parse_info(""), Err(FetchError::InvalidOutput(_))));
        assert!(matches!(parse_info("[download] 100%\n"), Err(FetchError::InvalidOutput(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_message_prefers_tool_diagnostics() {
        use std::os::unix::process::ExitStatusExt;

        let status = ExitStatus::from_raw(256);
        let errors = vec!["ERROR: Unable to download webpage".to_string()];
        let warnings = vec!["WARNING: [generic] Falling back on generic information extractor".to_string()];

        assert_eq!(failure_message(&errors, &warnings, status), "ERROR: Unable to download webpage");
        assert_eq!(failure_message(&[], &warnings, status), warnings[0]);
        // Progress noise or a traceback tail is never reported
        assert_eq!(failure_message(&[], &[], status), "yt-dlp exited with exit status: 1");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let ws = tempfile::tempdir().unwrap();
        let fetcher = YtDlp::new("/nonexistent/clipdrop-yt-dlp");
        let opts = DownloadOptions::new(ws.path(), "best");
        let err = fetcher.fetch("https://example.test/v", &opts).await.unwrap_err();
        assert!(matches!(err, FetchError::Spawn(_)));
    }
}
