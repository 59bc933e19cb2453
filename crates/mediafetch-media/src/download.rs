//! Media acquisition using yt-dlp.
//!
//! The extractor runs inside the request's workspace and reports the item's
//! metadata as a single JSON record on stdout. Progress and log lines are
//! routed to a [`ProgressSink`]; stderr is kept to classify failures.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use mediafetch_models::{ExtractionSpec, MediaInfo, MediaUrl, PostProcessor};

use crate::error::{MediaError, MediaResult};
use crate::progress::{dispatch_line, ProgressSink};
use crate::workspace::Workspace;

/// Minimum size for a valid cookies file (bytes).
/// A real Netscape cookies file is at least ~50 bytes.
const MIN_COOKIES_FILE_SIZE: u64 = 50;

/// Name of the per-request cookies copy inside the workspace.
const WORKSPACE_COOKIES_NAME: &str = ".cookies.txt";

/// stderr lines kept for failure classification.
const STDERR_TAIL_LINES: usize = 64;

/// Longest error detail surfaced to callers, in characters.
const MAX_ERROR_DETAIL: usize = 200;

/// Default browser user agent sent to the media host.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Bot-check texts, with both apostrophe forms the host has used.
const BOT_CHECK_MARKERS: &[&str] = &[
    "Sign in to confirm you\u{2019}re not a bot",
    "Sign in to confirm you're not a bot",
];

/// Configuration of the yt-dlp invocation.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// yt-dlp binary, a bare name resolved through PATH or an absolute path
    pub binary: PathBuf,
    /// Directory or binary path handed to `--ffmpeg-location`
    pub ffmpeg_location: Option<PathBuf>,
    pub user_agent: String,
    pub accept_language: String,
    /// Seconds to sleep before each download
    pub sleep_interval: u32,
    /// Upper bound of the randomized sleep
    pub max_sleep_interval: u32,
    pub retries: u32,
    pub fragment_retries: u32,
    /// e.g. `2M`
    pub limit_rate: Option<String>,
    pub skip_unavailable_fragments: bool,
    /// Client impersonation hints, e.g. `youtube:player_client=web`
    pub extractor_args: Option<String>,
    pub proxy: Option<String>,
    /// Netscape cookies file, copied into each workspace before use
    pub cookies_file: Option<PathBuf>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            ffmpeg_location: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
            sleep_interval: 1,
            max_sleep_interval: 5,
            retries: 10,
            fragment_retries: 10,
            limit_rate: None,
            skip_unavailable_fragments: true,
            extractor_args: Some("youtube:player_client=web".to_string()),
            proxy: None,
            cookies_file: None,
        }
    }
}

/// One extraction job.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub url: &'a MediaUrl,
    pub spec: &'a ExtractionSpec,
    /// Directory all outputs are written to
    pub workspace: &'a Path,
}

/// Something that can fetch media into a workspace.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Download the item, leaving its files in `request.workspace`.
    async fn extract(
        &self,
        request: &ExtractionRequest<'_>,
        sink: &dyn ProgressSink,
    ) -> MediaResult<MediaInfo>;
}

/// Metadata plus the files the extraction left in the workspace.
#[derive(Debug, Clone)]
pub struct AcquisitionResult {
    pub info: MediaInfo,
    /// Workspace files, most recently modified first
    pub files: Vec<PathBuf>,
}

/// Run `extractor` in `workspace` and list what it produced.
pub async fn acquire(
    extractor: &dyn Extractor,
    url: &MediaUrl,
    spec: &ExtractionSpec,
    workspace: &Workspace,
    sink: &dyn ProgressSink,
) -> MediaResult<AcquisitionResult> {
    let request = ExtractionRequest {
        url,
        spec,
        workspace: workspace.path(),
    };
    let info = extractor.extract(&request, sink).await?;
    let files = workspace.listing()?;

    debug!(url = %url, files = files.len(), "Acquisition finished");
    Ok(AcquisitionResult { info, files })
}

/// [`Extractor`] backed by the yt-dlp binary.
#[derive(Debug, Clone, Default)]
pub struct YtDlpExtractor {
    config: ExtractorConfig,
}

impl YtDlpExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract(
        &self,
        request: &ExtractionRequest<'_>,
        sink: &dyn ProgressSink,
    ) -> MediaResult<MediaInfo> {
        let cookies = match &self.config.cookies_file {
            Some(source) => prepare_cookies(source, request.workspace).await,
            None => None,
        };

        let args = build_args(&self.config, request, cookies.as_deref());
        info!(url = %request.url, format = %request.spec.format_selector, "Starting yt-dlp");
        debug!("Running yt-dlp: {} {}", self.config.binary.display(), args.join(" "));

        let mut child = Command::new(&self.config.binary)
            .args(&args)
            .current_dir(request.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::YtDlpNotFound,
                _ => MediaError::Io(e),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::acquisition_failed("yt-dlp stdout unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::acquisition_failed("yt-dlp stderr unavailable"))?;

        let read_stdout = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut record = None;
            while let Some(line) = lines.next_line().await? {
                if line.starts_with('{') {
                    record = Some(line);
                } else {
                    dispatch_line(&line, sink);
                }
            }
            Ok::<_, std::io::Error>(record)
        };

        let read_stderr = async {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Some(line) = lines.next_line().await? {
                dispatch_line(&line, sink);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok::<_, std::io::Error>(tail)
        };

        let (record, tail) = tokio::join!(read_stdout, read_stderr);
        let status = child.wait().await?;
        let record = record?;
        let stderr_text = tail?.into_iter().collect::<Vec<_>>().join("\n");

        if !status.success() {
            let err = classify_failure(&stderr_text);
            warn!(url = %request.url, code = err.code(), exit_code = ?status.code(), "yt-dlp failed");
            return Err(err);
        }

        match record {
            Some(json) => Ok(MediaInfo::from_json(&json)?),
            None => {
                warn!(url = %request.url, "yt-dlp printed no metadata record");
                Ok(MediaInfo::default())
            }
        }
    }
}

/// Build the yt-dlp argument vector for one request.
pub fn build_args(
    config: &ExtractorConfig,
    request: &ExtractionRequest<'_>,
    cookies: Option<&Path>,
) -> Vec<String> {
    let spec = request.spec;
    let mut args: Vec<String> = [
        "--newline",
        "--progress",
        "--dump-single-json",
        "--no-simulate",
        "--no-playlist",
        "--abort-on-error",
        "--no-part",
        "--write-thumbnail",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push("--user-agent".into());
    args.push(config.user_agent.clone());
    args.push("--add-header".into());
    args.push(format!("Accept-Language:{}", config.accept_language));

    if config.sleep_interval > 0 {
        args.push("--sleep-interval".into());
        args.push(config.sleep_interval.to_string());
        args.push("--max-sleep-interval".into());
        args.push(config.max_sleep_interval.max(config.sleep_interval).to_string());
    }

    args.push("--retries".into());
    args.push(config.retries.to_string());
    args.push("--fragment-retries".into());
    args.push(config.fragment_retries.to_string());

    if config.skip_unavailable_fragments {
        args.push("--skip-unavailable-fragments".into());
    } else {
        args.push("--abort-on-unavailable-fragments".into());
    }

    if let Some(rate) = &config.limit_rate {
        args.push("--limit-rate".into());
        args.push(rate.clone());
    }
    if let Some(extractor_args) = &config.extractor_args {
        args.push("--extractor-args".into());
        args.push(extractor_args.clone());
    }
    if let Some(proxy) = &config.proxy {
        args.push("--proxy".into());
        args.push(proxy.clone());
    }
    if let Some(cookies) = cookies {
        args.push("--cookies".into());
        args.push(cookies.to_string_lossy().to_string());
    }
    if let Some(ffmpeg) = &config.ffmpeg_location {
        args.push("--ffmpeg-location".into());
        args.push(ffmpeg.to_string_lossy().to_string());
    }

    args.push("-f".into());
    args.push(spec.format_selector.clone());

    if let Some(container) = spec.merge_output_format {
        args.push("--merge-output-format".into());
        args.push(container.to_string());
    }

    for step in &spec.post_processors {
        match step {
            PostProcessor::ExtractAudio {
                codec,
                quality_kbps,
            } => {
                args.push("-x".into());
                args.push("--audio-format".into());
                args.push(codec.as_str().to_string());
                args.push("--audio-quality".into());
                args.push(format!("{}K", quality_kbps));
            }
            PostProcessor::EmbedMetadata => args.push("--embed-metadata".into()),
        }
    }

    args.push("-o".into());
    args.push(
        request
            .workspace
            .join(spec.output_template)
            .to_string_lossy()
            .to_string(),
    );

    // end of options, so a URL can never be read as a flag
    args.push("--".into());
    args.push(request.url.as_str().to_string());

    args
}

/// Map yt-dlp's stderr to a typed failure.
pub fn classify_failure(stderr: &str) -> MediaError {
    let last_error = stderr
        .lines()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|line| !line.trim().is_empty()))
        .unwrap_or("yt-dlp exited with an error")
        .trim();
    let detail = truncate_chars(last_error, MAX_ERROR_DETAIL);

    if BOT_CHECK_MARKERS.iter().any(|m| stderr.contains(m)) {
        MediaError::BotDetected { message: detail }
    } else if stderr.contains("Unsupported URL") {
        MediaError::UnsupportedUrl(detail)
    } else if stderr.contains("No space left on device") || stderr.contains("Errno 28") {
        MediaError::resource(detail)
    } else {
        MediaError::acquisition_failed(detail)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Validate that a cookies file appears to be in Netscape format.
///
/// Netscape cookies files either start with "# Netscape HTTP Cookie File"
/// or contain tab-separated lines with domain entries.
fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File")
        || content.starts_with("# HTTP Cookie File")
    {
        return true;
    }

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| line.split('\t').count() >= 6)
}

/// Copy a usable cookies file into the workspace.
///
/// yt-dlp writes cookies back after use, so every request gets a private
/// copy. Returns `None` if the file is missing, too small or not in
/// Netscape format.
pub async fn prepare_cookies(source: &Path, workspace: &Path) -> Option<PathBuf> {
    let metadata = match tokio::fs::metadata(source).await {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!(path = %source.display(), error = %e, "Cookies file unavailable, skipping");
            return None;
        }
    };

    if metadata.len() < MIN_COOKIES_FILE_SIZE {
        debug!(
            path = %source.display(),
            size = metadata.len(),
            "Cookies file too small, skipping"
        );
        return None;
    }

    match tokio::fs::read_to_string(source).await {
        Ok(content) if is_valid_netscape_cookies(&content) => {}
        Ok(_) => {
            debug!(path = %source.display(), "Cookies file is not in Netscape format, skipping");
            return None;
        }
        Err(e) => {
            warn!("Failed to read cookies file: {}", e);
            return None;
        }
    }

    let target = workspace.join(WORKSPACE_COOKIES_NAME);
    match tokio::fs::copy(source, &target).await {
        Ok(_) => Some(target),
        Err(e) => {
            warn!("Failed to copy cookies file into workspace: {}", e);
            None
        }
    }
}
