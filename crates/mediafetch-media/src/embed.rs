//! Cover-art embedding.
//!
//! Writes the normalized JPEG thumbnail into the media container's native
//! cover slot. Only ID3-tagged MP3 and MP4-family files are handled; every
//! other container is left untouched.

use std::path::{Path, PathBuf};

use lofty::config::{ParseOptions, WriteOptions};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::Tag;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Container families cover art can be embedded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFamily {
    /// MP3 with an ID3v2 tag
    Id3Audio,
    /// MP4/M4A with an `ilst` atom
    Mp4,
    /// No embedding defined
    Other,
}

impl ContainerFamily {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("mp3") => ContainerFamily::Id3Audio,
            Some("m4a") | Some("mp4") => ContainerFamily::Mp4,
            _ => ContainerFamily::Other,
        }
    }

    pub fn supports_cover_art(&self) -> bool {
        !matches!(self, ContainerFamily::Other)
    }
}

/// Embed `jpeg` as the front cover of `media`.
///
/// Returns `Ok(false)` when the container has no cover-art support and
/// nothing was written. Runs the tag I/O on the blocking pool.
pub async fn embed_cover_art(media: &Path, jpeg: &Path) -> MediaResult<bool> {
    let family = ContainerFamily::from_path(media);
    if !family.supports_cover_art() {
        debug!(path = %media.display(), "No cover-art slot for this container");
        return Ok(false);
    }

    let image = tokio::fs::read(jpeg)
        .await
        .map_err(|e| MediaError::embedding(format!("cannot read {}: {}", jpeg.display(), e)))?;

    let media: PathBuf = media.to_path_buf();
    tokio::task::spawn_blocking(move || write_cover(&media, family, image))
        .await
        .map_err(|e| MediaError::embedding(format!("embedding task failed: {}", e)))??;

    Ok(true)
}

fn write_cover(media: &Path, family: ContainerFamily, image: Vec<u8>) -> MediaResult<()> {
    let mut picture = Picture::from_reader(&mut image.as_slice())
        .map_err(|e| MediaError::embedding(format!("unreadable cover image: {}", e)))?;
    if picture.mime_type() != Some(&MimeType::Jpeg) {
        return Err(MediaError::embedding("cover image is not a JPEG"));
    }
    picture.set_pic_type(PictureType::CoverFront);

    // stream properties are not needed to rewrite tags
    let mut tagged = Probe::open(media)
        .map(|opened| opened.options(ParseOptions::new().read_properties(false)))
        .and_then(|opened| opened.read())
        .map_err(|e| MediaError::embedding(format!("cannot read {}: {}", media.display(), e)))?;

    let tag_type = tagged.primary_tag_type();
    if tagged.primary_tag().is_none() {
        tagged.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged
        .primary_tag_mut()
        .ok_or_else(|| MediaError::embedding("no writable tag"))?;

    match family {
        // `covr` carries no picture roles, every entry is cover art
        ContainerFamily::Mp4 => {
            while !tag.pictures().is_empty() {
                tag.remove_picture(0);
            }
        }
        _ => tag.remove_picture_type(PictureType::CoverFront),
    }
    tag.push_picture(picture);

    let options = match family {
        ContainerFamily::Id3Audio => WriteOptions::default().use_id3v23(true),
        _ => WriteOptions::default(),
    };

    tag.save_to_path(media, options)
        .map_err(|e| MediaError::embedding(format!("cannot write {}: {}", media.display(), e)))?;

    debug!(path = %media.display(), ?tag_type, "Embedded cover art");
    Ok(())
}
