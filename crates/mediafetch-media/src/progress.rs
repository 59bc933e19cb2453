//! yt-dlp progress parsing and the sinks progress is reported to.

use serde::Serialize;
use tracing::{debug, info};

/// Progress of the running download, parsed from a `[download]` line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DownloadProgress {
    /// Percentage of the current file, 0-100
    pub percent: f64,
    /// Total size as printed, e.g. `10.00MiB`
    pub total: Option<String>,
    /// Current speed as printed, e.g. `1.00MiB/s`
    pub speed: Option<String>,
    /// Remaining time as printed, e.g. `00:05`
    pub eta: Option<String>,
}

impl DownloadProgress {
    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }
}

/// Receives progress and log output from the extraction tool.
pub trait ProgressSink: Send + Sync {
    /// Called for every parsed progress line.
    fn on_progress(&self, progress: &DownloadProgress);

    /// Called when a post-processor (merger, audio extraction, tagging) starts.
    fn on_post_process(&self, step: &str) {
        let _ = step;
    }

    /// Called for every other line of tool output.
    fn on_log(&self, line: &str) {
        debug!(target: "mediafetch::extractor", "{}", line);
    }
}

/// Sink that only logs.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn on_progress(&self, progress: &DownloadProgress) {
        if progress.is_complete() {
            info!(total = ?progress.total, "Download finished, now post-processing");
        }
    }

    fn on_post_process(&self, step: &str) {
        debug!(step = step, "Post-processing");
    }
}

/// Post-processor tags yt-dlp prefixes its output with.
const POST_PROCESS_TAGS: &[&str] = &["[Merger]", "[ExtractAudio]", "[Metadata]", "[FixupM4a]"];

/// Route one line of tool output to the sink.
pub fn dispatch_line(line: &str, sink: &dyn ProgressSink) {
    let line = line.trim_end();
    if line.is_empty() {
        return;
    }

    if let Some(progress) = parse_progress_line(line) {
        sink.on_progress(&progress);
        return;
    }

    if let Some(tag) = POST_PROCESS_TAGS.iter().find(|tag| line.starts_with(**tag)) {
        sink.on_post_process(tag.trim_matches(|c| c == '[' || c == ']'));
    }

    sink.on_log(line);
}

/// Parse a progress line such as
/// `[download]  42.3% of ~  10.00MiB at    1.00MiB/s ETA 00:05`.
pub fn parse_progress_line(line: &str) -> Option<DownloadProgress> {
    let rest = line.trim().strip_prefix("[download]")?;
    let mut tokens = rest.split_whitespace().filter(|t| *t != "~");

    let percent = tokens.next()?.strip_suffix('%')?.parse::<f64>().ok()?;
    let mut progress = DownloadProgress {
        percent,
        ..Default::default()
    };

    while let Some(token) = tokens.next() {
        match token {
            "of" => progress.total = tokens.next().map(str::to_string),
            "at" => progress.speed = tokens.next().map(str::to_string),
            "ETA" => progress.eta = tokens.next().map(str::to_string),
            _ => {}
        }
    }

    Some(progress)
}
