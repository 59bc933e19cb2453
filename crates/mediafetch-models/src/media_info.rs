//! Metadata reported by the extraction tool for one item.

use serde::{Deserialize, Serialize};

/// The subset of the extractor's info record the pipeline consumes.
///
/// Every field is optional on the wire; yt-dlp omits or nulls fields a
/// site does not provide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Site-specific item id
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    /// Upload date as `YYYYMMDD`
    #[serde(default)]
    pub upload_date: Option<String>,
    /// Human readable duration, e.g. `3:45`
    #[serde(default)]
    pub duration_string: Option<String>,
    /// Remote thumbnail URL
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl MediaInfo {
    /// Parse the JSON record printed by `--dump-single-json`.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extractor_record() {
        let json = r#"{
            "id": "abc123",
            "title": "A Title",
            "uploader": "Someone",
            "view_count": 12345,
            "upload_date": "20240105",
            "duration_string": "3:45",
            "thumbnail": "https://i.ytimg.com/vi/abc123/maxresdefault.webp",
            "formats": [{"format_id": "18"}],
            "extractor": "youtube"
        }"#;

        let info = MediaInfo::from_json(json).unwrap();
        assert_eq!(info.id.as_deref(), Some("abc123"));
        assert_eq!(info.title.as_deref(), Some("A Title"));
        assert_eq!(info.view_count, Some(12345));
        assert_eq!(info.upload_date.as_deref(), Some("20240105"));
    }

    #[test]
    fn test_parse_sparse_record() {
        let info = MediaInfo::from_json(r#"{"title": null, "view_count": null}"#).unwrap();
        assert_eq!(info, MediaInfo::default());
    }
}
