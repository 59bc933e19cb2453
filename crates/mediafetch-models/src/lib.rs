//! Shared data models for the mediafetch service.
//!
//! This crate provides:
//! - Output profiles and the extraction directives they resolve to
//! - The supported media URL allow-list
//! - The extractor's metadata record
//! - Display metadata with human-formatted counts and dates

pub mod display;
pub mod media_info;
pub mod profile;
pub mod url;

pub use display::{format_upload_date, format_view_count, DisplayMetadata, UNKNOWN};
pub use media_info::MediaInfo;
pub use profile::{
    AudioCodec, ExtractionSpec, PostProcessor, Profile, ProfileError, ProfileOption,
    PROFILE_OPTIONS, SUPPORTED_HEIGHTS,
};
pub use url::{is_supported_url, validate_media_url, MediaUrl, UrlError, MAX_URL_LENGTH};
