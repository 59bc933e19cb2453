//! Display metadata handed to the presentation layer.

use chrono::NaiveDate;
use serde::Serialize;

use crate::media_info::MediaInfo;

/// Placeholder for any field the extractor did not report.
pub const UNKNOWN: &str = "Unknown";

/// Read-only projection of an acquisition plus the finalized file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayMetadata {
    pub title: String,
    pub uploader: String,
    /// View count with K/M/B suffix
    pub views: String,
    /// Long-form upload date
    pub upload_date: String,
    pub duration: String,
    /// Name of the finalized file in the output root
    pub filename: String,
    /// Extension of the finalized file, without the dot
    pub ext: String,
    /// Local serving path of the thumbnail, or the remote URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl DisplayMetadata {
    pub fn new(
        info: &MediaInfo,
        filename: impl Into<String>,
        ext: impl Into<String>,
        thumbnail: Option<String>,
    ) -> Self {
        let or_unknown = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(UNKNOWN)
                .to_string()
        };

        Self {
            title: or_unknown(&info.title),
            uploader: or_unknown(&info.uploader),
            views: format_view_count(info.view_count),
            upload_date: format_upload_date(info.upload_date.as_deref()),
            duration: or_unknown(&info.duration_string),
            filename: filename.into(),
            ext: ext.into(),
            thumbnail,
        }
    }
}

/// Format a view count with one decimal and a K/M/B suffix.
pub fn format_view_count(count: Option<u64>) -> String {
    let Some(count) = count else {
        return UNKNOWN.to_string();
    };

    let n = count as f64;
    if count >= 1_000_000_000 {
        format!("{:.1}B", n / 1_000_000_000.0)
    } else if count >= 1_000_000 {
        format!("{:.1}M", n / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", n / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Format a `YYYYMMDD` date as e.g. `January 5, 2024`.
pub fn format_upload_date(date: Option<&str>) -> String {
    date.and_then(parse_compact_date)
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn parse_compact_date(date: &str) -> Option<NaiveDate> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year = date[0..4].parse().ok()?;
    let month = date[4..6].parse().ok()?;
    let day = date[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
