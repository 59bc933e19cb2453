//! Media URL allow-list.
//!
//! URLs are untrusted input and are checked here before any workspace is
//! created or any external process is started.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Maximum URL length accepted from a request.
pub const MAX_URL_LENGTH: usize = 2048;

/// Host patterns of supported media sites.
pub const SUPPORTED_HOST_PATTERNS: &[&str] = &[
    r"youtube\.com|youtu\.be",
    r"vimeo\.com",
    r"tiktok\.com",
    r"twitter\.com|x\.com",
    r"nicovideo\.jp",
];

/// Optional scheme, optional `www.`, an allowed host and a non-empty path.
static MEDIA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(https?://)?(www\.)?({})/.+$",
        SUPPORTED_HOST_PATTERNS.join("|")
    ))
    .expect("media URL pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("URL is empty")]
    Empty,

    #[error("URL exceeds maximum length of {} characters", MAX_URL_LENGTH)]
    TooLong,

    #[error("URL is not from a supported video site")]
    UnsupportedHost,
}

/// A URL that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaUrl(String);

impl MediaUrl {
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        validate_media_url(raw).map(|url| Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a submitted URL, returning it trimmed.
pub fn validate_media_url(raw: &str) -> Result<&str, UrlError> {
    let url = raw.trim();

    if url.is_empty() {
        return Err(UrlError::Empty);
    }
    if url.len() > MAX_URL_LENGTH {
        return Err(UrlError::TooLong);
    }
    if !MEDIA_URL.is_match(url) {
        return Err(UrlError::UnsupportedHost);
    }

    Ok(url)
}

/// Check if a URL is on the allow-list.
pub fn is_supported_url(raw: &str) -> bool {
    validate_media_url(raw).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_known_hosts() {
        assert!(is_supported_url("https://youtu.be/abc123"));
        assert!(is_supported_url("https://www.youtube.com/watch?v=abc123def45"));
        assert!(is_supported_url("youtube.com/shorts/abc"));
        assert!(is_supported_url("http://vimeo.com/123"));
        assert!(is_supported_url("https://x.com/user/status/1"));
        assert!(is_supported_url("https://twitter.com/user/status/1"));
        assert!(is_supported_url("https://www.tiktok.com/@user/video/1"));
        assert!(is_supported_url("https://nicovideo.jp/watch/sm9"));
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(
            validate_media_url("  https://youtu.be/abc123\n"),
            Ok("https://youtu.be/abc123")
        );
        let url = MediaUrl::parse(" https://vimeo.com/1 ").unwrap();
        assert_eq!(url.as_str(), "https://vimeo.com/1");
    }

    #[test]
    fn test_rejects_unknown_hosts() {
        assert_eq!(
            validate_media_url("https://example.com/video"),
            Err(UrlError::UnsupportedHost)
        );
        assert!(!is_supported_url("ftp://youtube.com/watch?v=abc"));
        assert!(!is_supported_url("https://youtube.com.evil.net/watch"));
        assert!(!is_supported_url("https://m.youtube.com/watch?v=abc"));
    }

    #[test]
    fn test_requires_path() {
        assert!(!is_supported_url("https://youtube.com"));
        assert!(!is_supported_url("https://youtube.com/"));
    }

    #[test]
    fn test_empty_and_too_long() {
        assert_eq!(validate_media_url("   "), Err(UrlError::Empty));
        let long = format!("https://youtu.be/{}", "a".repeat(MAX_URL_LENGTH));
        assert_eq!(validate_media_url(&long), Err(UrlError::TooLong));
    }
}
