//! API configuration.

use std::path::PathBuf;
use std::str::FromStr;

use mediafetch_media::{ExtractorConfig, DEFAULT_FFMPEG_TIMEOUT_SECS};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Submissions per second allowed per client IP
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Take the client IP from X-Forwarded-For / X-Real-IP.
    /// Only safe behind a proxy that overwrites them.
    pub trust_proxy_headers: bool,
    /// Environment (development/production)
    pub environment: String,
    /// Finalized media files
    pub output_dir: PathBuf,
    /// Finalized thumbnails, served statically
    pub thumbnail_dir: PathBuf,
    /// URL path the thumbnail directory is served under
    pub thumbnail_url_prefix: String,
    /// Explicit FFmpeg binary; looked up on PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
    /// Ceiling for a single FFmpeg invocation
    pub ffmpeg_timeout_secs: u64,
    pub ytdlp_path: PathBuf,
    pub ytdlp_user_agent: Option<String>,
    pub ytdlp_cookies_file: Option<PathBuf>,
    pub ytdlp_proxy: Option<String>,
    pub ytdlp_sleep_interval: u32,
    pub ytdlp_max_sleep_interval: u32,
    pub ytdlp_retries: u32,
    pub ytdlp_limit_rate: Option<String>,
    /// Romanize non-Latin titles in file names
    pub transliterate_filenames: bool,
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let extractor = ExtractorConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 2,
            max_body_size: 64 * 1024,
            trust_proxy_headers: false,
            environment: "development".to_string(),
            output_dir: PathBuf::from("downloads"),
            thumbnail_dir: PathBuf::from("static/thumbnail"),
            thumbnail_url_prefix: "/thumbnails".to_string(),
            ffmpeg_path: None,
            ffmpeg_timeout_secs: DEFAULT_FFMPEG_TIMEOUT_SECS,
            ytdlp_path: extractor.binary,
            ytdlp_user_agent: None,
            ytdlp_cookies_file: None,
            ytdlp_proxy: None,
            ytdlp_sleep_interval: extractor.sleep_interval,
            ytdlp_max_sleep_interval: extractor.max_sleep_interval,
            ytdlp_retries: extractor.retries,
            ytdlp_limit_rate: None,
            transliterate_filenames: true,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| non_empty_var(&var, key);
        let flag = |key: &str, default: bool| {
            non_empty(key)
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };

        Self {
            host: non_empty("API_HOST").unwrap_or(defaults.host),
            port: parsed(&var, "API_PORT").unwrap_or(defaults.port),
            cors_origins: non_empty("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: parsed(&var, "RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            max_body_size: parsed(&var, "MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            trust_proxy_headers: flag("TRUST_PROXY_HEADERS", defaults.trust_proxy_headers),
            environment: non_empty("ENVIRONMENT").unwrap_or(defaults.environment),
            output_dir: non_empty("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            thumbnail_dir: non_empty("THUMBNAIL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.thumbnail_dir),
            thumbnail_url_prefix: non_empty("THUMBNAIL_URL_PREFIX")
                .and_then(|p| normalize_prefix(&p))
                .unwrap_or(defaults.thumbnail_url_prefix),
            ffmpeg_path: non_empty("FFMPEG_PATH").map(PathBuf::from),
            ffmpeg_timeout_secs: parsed(&var, "FFMPEG_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.ffmpeg_timeout_secs),
            ytdlp_path: non_empty("YTDLP_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ytdlp_path),
            ytdlp_user_agent: non_empty("YTDLP_USER_AGENT"),
            ytdlp_cookies_file: non_empty("YTDLP_COOKIES_FILE").map(PathBuf::from),
            ytdlp_proxy: non_empty("YTDLP_PROXY"),
            ytdlp_sleep_interval: parsed(&var, "YTDLP_SLEEP_INTERVAL")
                .unwrap_or(defaults.ytdlp_sleep_interval),
            ytdlp_max_sleep_interval: parsed(&var, "YTDLP_MAX_SLEEP_INTERVAL")
                .unwrap_or(defaults.ytdlp_max_sleep_interval),
            ytdlp_retries: parsed(&var, "YTDLP_RETRIES").unwrap_or(defaults.ytdlp_retries),
            ytdlp_limit_rate: non_empty("YTDLP_LIMIT_RATE"),
            transliterate_filenames: flag("TRANSLITERATE_FILENAMES", defaults.transliterate_filenames),
            metrics_enabled: flag("METRICS_ENABLED", defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Extractor settings derived from this configuration.
    pub fn extractor_config(&self) -> ExtractorConfig {
        let defaults = ExtractorConfig::default();
        ExtractorConfig {
            binary: self.ytdlp_path.clone(),
            ffmpeg_location: self.ffmpeg_path.clone(),
            user_agent: self.ytdlp_user_agent.clone().unwrap_or(defaults.user_agent),
            sleep_interval: self.ytdlp_sleep_interval,
            max_sleep_interval: self.ytdlp_max_sleep_interval,
            retries: self.ytdlp_retries,
            limit_rate: self.ytdlp_limit_rate.clone(),
            proxy: self.ytdlp_proxy.clone(),
            cookies_file: self.ytdlp_cookies_file.clone(),
            ..defaults
        }
    }
}

fn non_empty_var(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    non_empty_var(var, key).and_then(|v| v.parse().ok())
}

/// `static/thumbs/` becomes `/static/thumbs`. The root is rejected: the
/// thumbnail directory cannot be mounted over the submission route.
fn normalize_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ApiConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]);
        assert_eq!(c.port, 8000);
        assert_eq!(c.output_dir, PathBuf::from("downloads"));
        assert_eq!(c.thumbnail_url_prefix, "/thumbnails");
        assert!(c.ffmpeg_path.is_none());
        assert!(c.transliterate_filenames);
        assert!(!c.is_production());
        assert!(!c.trust_proxy_headers);
        assert_eq!(c.ffmpeg_timeout_secs, DEFAULT_FFMPEG_TIMEOUT_SECS);
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("API_PORT", "9000"),
            ("ENVIRONMENT", "Production"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("THUMBNAIL_URL_PREFIX", "static/thumbs/"),
            ("FFMPEG_PATH", "/usr/local/bin/ffmpeg"),
            ("YTDLP_USER_AGENT", "test-agent"),
            ("YTDLP_LIMIT_RATE", "2M"),
            ("TRANSLITERATE_FILENAMES", "false"),
            ("METRICS_ENABLED", "0"),
            ("TRUST_PROXY_HEADERS", "true"),
            ("FFMPEG_TIMEOUT_SECS", "30"),
        ]);
        assert_eq!(c.port, 9000);
        assert!(c.is_production());
        assert_eq!(c.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(c.thumbnail_url_prefix, "/static/thumbs");
        assert!(!c.transliterate_filenames);
        assert!(!c.metrics_enabled);
        assert!(c.trust_proxy_headers);
        assert_eq!(c.ffmpeg_timeout_secs, 30);

        let extractor = c.extractor_config();
        assert_eq!(extractor.user_agent, "test-agent");
        assert_eq!(extractor.limit_rate.as_deref(), Some("2M"));
        assert_eq!(
            extractor.ffmpeg_location,
            Some(PathBuf::from("/usr/local/bin/ffmpeg"))
        );
    }

    #[test]
    fn test_blank_and_invalid_values_fall_back() {
        let c = config(&[("API_PORT", "not-a-port"), ("FFMPEG_PATH", "  ")]);
        assert_eq!(c.port, 8000);
        assert!(c.ffmpeg_path.is_none());

        let c = config(&[("FFMPEG_TIMEOUT_SECS", "0")]);
        assert_eq!(c.ffmpeg_timeout_secs, DEFAULT_FFMPEG_TIMEOUT_SECS);

        let c = config(&[("THUMBNAIL_URL_PREFIX", "/")]);
        assert_eq!(c.thumbnail_url_prefix, "/thumbnails");
    }
}
