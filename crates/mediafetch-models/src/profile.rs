//! Output profiles and the extraction directives they resolve to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Video heights offered as resolution tiers.
pub const SUPPORTED_HEIGHTS: &[u32] = &[2160, 1440, 1080, 720, 480, 360];

/// Container every video tier is merged into.
pub const VIDEO_CONTAINER: &str = "mp4";

/// Bitrate used when transcoding to an audio codec.
pub const AUDIO_QUALITY_KBPS: u32 = 320;

/// Output template for video downloads, relative to the workspace.
pub const VIDEO_OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Output template for audio downloads. The item id keeps the pre- and
/// post-extraction files apart.
pub const AUDIO_OUTPUT_TEMPLATE: &str = "%(title)s.%(id)s.%(ext)s";

/// Audio codecs an audio profile can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    Mp3,
    M4a,
    Opus,
    Wav,
}

impl AudioCodec {
    pub const ALL: &'static [AudioCodec] = &[
        AudioCodec::Mp3,
        AudioCodec::M4a,
        AudioCodec::Opus,
        AudioCodec::Wav,
    ];

    /// Codec name as understood by yt-dlp, which is also the file extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::M4a => "m4a",
            AudioCodec::Opus => "opus",
            AudioCodec::Wav => "wav",
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested output profile.
///
/// Only constructed through [`FromStr`], so a `VideoTier` height is always
/// one of [`SUPPORTED_HEIGHTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    /// Best video not exceeding `height`, merged with the best audio.
    VideoTier { height: u32 },
    /// Audio only, transcoded to `codec`.
    AudioCodec(AudioCodec),
}

impl Profile {
    /// The token this profile was parsed from.
    pub fn token(&self) -> String {
        match self {
            Profile::VideoTier { height } => format!("video_{}", height),
            Profile::AudioCodec(codec) => codec.as_str().to_string(),
        }
    }

    /// Extension of the file the extraction is expected to leave behind.
    pub fn expected_extension(&self) -> &'static str {
        match self {
            Profile::VideoTier { .. } => VIDEO_CONTAINER,
            Profile::AudioCodec(codec) => codec.as_str(),
        }
    }

    /// Resolve to concrete extraction directives. Pure and total.
    pub fn resolve(&self) -> ExtractionSpec {
        match *self {
            Profile::VideoTier { height } => ExtractionSpec {
                format_selector: format!(
                    "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]",
                    h = height
                ),
                output_template: VIDEO_OUTPUT_TEMPLATE,
                merge_output_format: Some(VIDEO_CONTAINER),
                post_processors: Vec::new(),
                expected_extension: VIDEO_CONTAINER,
            },
            Profile::AudioCodec(codec) => ExtractionSpec {
                format_selector: "bestaudio/best".to_string(),
                output_template: AUDIO_OUTPUT_TEMPLATE,
                merge_output_format: None,
                post_processors: vec![
                    PostProcessor::ExtractAudio {
                        codec,
                        quality_kbps: AUDIO_QUALITY_KBPS,
                    },
                    PostProcessor::EmbedMetadata,
                ],
                expected_extension: codec.as_str(),
            },
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl FromStr for Profile {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();

        if let Some(height) = token.strip_prefix("video_") {
            return height
                .parse::<u32>()
                .ok()
                .filter(|h| SUPPORTED_HEIGHTS.contains(h))
                .map(|height| Profile::VideoTier { height })
                .ok_or_else(|| ProfileError(s.to_string()));
        }

        AudioCodec::ALL
            .iter()
            .find(|codec| codec.as_str() == token)
            .map(|codec| Profile::AudioCodec(*codec))
            .ok_or_else(|| ProfileError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown output profile: {0:?}")]
pub struct ProfileError(String);

/// Post-processing steps handed to the extraction tool, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "key", rename_all = "snake_case")]
pub enum PostProcessor {
    /// Extract the audio stream and transcode it.
    ExtractAudio { codec: AudioCodec, quality_kbps: u32 },
    /// Write the standard title/artist/date tags.
    EmbedMetadata,
}

/// Concrete extraction directives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionSpec {
    /// yt-dlp `-f` stream selector
    pub format_selector: String,
    /// Output path template, relative to the workspace
    pub output_template: &'static str,
    /// Container used when merging separate video and audio streams
    pub merge_output_format: Option<&'static str>,
    pub post_processors: Vec<PostProcessor>,
    /// Extension of the primary media file after post-processing
    pub expected_extension: &'static str,
}

/// A profile as offered to users.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProfileOption {
    pub token: &'static str,
    pub label: &'static str,
}

/// Every offered profile, highest video tier first.
pub const PROFILE_OPTIONS: &[ProfileOption] = &[
    ProfileOption { token: "video_2160", label: "4K (2160p)" },
    ProfileOption { token: "video_1440", label: "2K (1440p)" },
    ProfileOption { token: "video_1080", label: "Full HD (1080p)" },
    ProfileOption { token: "video_720", label: "HD (720p)" },
    ProfileOption { token: "video_480", label: "480p" },
    ProfileOption { token: "video_360", label: "360p" },
    ProfileOption { token: "mp3", label: "MP3 (audio)" },
    ProfileOption { token: "m4a", label: "M4A (audio)" },
    ProfileOption { token: "opus", label: "Opus (audio)" },
    ProfileOption { token: "wav", label: "WAV (audio)" },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_tiers() {
        for height in SUPPORTED_HEIGHTS {
            let profile: Profile = format!("video_{}", height).parse().unwrap();
            assert_eq!(profile, Profile::VideoTier { height: *height });
            assert_eq!(profile.expected_extension(), "mp4");
        }
    }

    #[test]
    fn test_parse_audio_codecs() {
        assert_eq!("mp3".parse::<Profile>().unwrap(), Profile::AudioCodec(AudioCodec::Mp3));
        assert_eq!(" opus ".parse::<Profile>().unwrap(), Profile::AudioCodec(AudioCodec::Opus));
        assert_eq!("wav".parse::<Profile>().unwrap().expected_extension(), "wav");
    }

    #[test]
    fn test_parse_rejects_unknown_tokens() {
        for token in [
            "", "video_", "video_1000", "video_abc", "video_-720", "flac", "MP3x", "1080",
            "video_1080p",
        ] {
            assert!(token.parse::<Profile>().is_err(), "accepted {:?}", token);
        }
    }

    #[test]
    fn test_resolve_video_tier() {
        let spec = Profile::VideoTier { height: 1080 }.resolve();
        assert_eq!(
            spec.format_selector,
            "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]"
        );
        assert_eq!(spec.merge_output_format, Some("mp4"));
        assert_eq!(spec.output_template, VIDEO_OUTPUT_TEMPLATE);
        assert!(spec.post_processors.is_empty());
        assert_eq!(spec.expected_extension, "mp4");
    }

    #[test]
    fn test_resolve_audio_codec() {
        let spec = Profile::AudioCodec(AudioCodec::M4a).resolve();
        assert_eq!(spec.format_selector, "bestaudio/best");
        assert_eq!(spec.merge_output_format, None);
        assert_eq!(spec.output_template, AUDIO_OUTPUT_TEMPLATE);
        assert_eq!(
            spec.post_processors,
            vec![
                PostProcessor::ExtractAudio {
                    codec: AudioCodec::M4a,
                    quality_kbps: 320
                },
                PostProcessor::EmbedMetadata,
            ]
        );
        assert_eq!(spec.expected_extension, "m4a");
    }

    #[test]
    fn test_every_option_parses_back() {
        for option in PROFILE_OPTIONS {
            let profile: Profile = option.token.parse().unwrap();
            assert_eq!(profile.token(), option.token);
        }
    }
}
