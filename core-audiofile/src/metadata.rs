//! # Container Tags
//!
//! Reads the descriptive tags (title, artist, ...) embedded in an audio file
//! using the `lofty` crate. Supports ID3v2, Vorbis Comments, MP4 atoms and
//! RIFF INFO chunks.

use lofty::config::ParseOptions;
use lofty::file::{TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Key under which the track title is stored.
pub const KEY_TITLE: &str = "title";
/// Key under which the track artist is stored.
pub const KEY_ARTIST: &str = "artist";
/// Key under which the album title is stored.
pub const KEY_ALBUM: &str = "album";
/// Key under which the album artist is stored.
pub const KEY_ALBUM_ARTIST: &str = "album artist";
/// Key under which the release year is stored.
pub const KEY_YEAR: &str = "year";
/// Key under which the track number is stored.
pub const KEY_TRACK_NUMBER: &str = "track number";
/// Key under which the genre is stored.
pub const KEY_GENRE: &str = "genre";
/// Key under which the composer is stored.
pub const KEY_COMPOSER: &str = "composer";
/// Key under which free-form comments are stored.
pub const KEY_COMMENTS: &str = "comments";

/// Reads container tags into a flat string map.
///
/// Tag reading never fails an open: a file without tags, or with tags lofty
/// cannot parse, yields an empty map.
#[derive(Debug, Clone, Copy)]
pub struct MetadataReader {
    parse_options: ParseOptions,
}

impl MetadataReader {
    /// Create a reader with lofty's default parse options.
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    /// Read the tags of the file at `path`.
    pub fn read(&self, path: &Path) -> HashMap<String, String> {
        let tagged_file = match self.probe(path) {
            Ok(file) => file,
            Err(e) => {
                debug!("No readable tags in {}: {}", path.display(), e);
                return HashMap::new();
            }
        };

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());

        match tag {
            Some(tag) => Self::collect(tag),
            None => {
                debug!("File carries no tags: {}", path.display());
                HashMap::new()
            }
        }
    }

    fn probe(&self, path: &Path) -> lofty::error::Result<TaggedFile> {
        Probe::open(path)?
            .options(self.parse_options)
            .guess_file_type()?
            .read()
    }

    fn collect(tag: &Tag) -> HashMap<String, String> {
        let entries = [
            (KEY_TITLE, tag.title().map(|s| s.to_string())),
            (KEY_ARTIST, tag.artist().map(|s| s.to_string())),
            (KEY_ALBUM, tag.album().map(|s| s.to_string())),
            (
                KEY_ALBUM_ARTIST,
                tag.get_string(&ItemKey::AlbumArtist).map(str::to_string),
            ),
            (KEY_YEAR, tag.year().map(|y| y.to_string())),
            (KEY_TRACK_NUMBER, tag.track().map(|t| t.to_string())),
            (KEY_GENRE, tag.genre().map(|s| s.to_string())),
            (
                KEY_COMPOSER,
                tag.get_string(&ItemKey::Composer).map(str::to_string),
            ),
            (KEY_COMMENTS, tag.comment().map(|s| s.to_string())),
        ];

        entries
            .into_iter()
            .filter_map(|(key, value)| {
                let value = normalize_text(&value?);
                (!value.is_empty()).then(|| (key.to_string(), value))
            })
            .collect()
    }
}

impl Default for MetadataReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse whitespace runs and strip control characters.
fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalizes_whitespace_and_control_characters() {
        assert_eq!(normalize_text("  Blue \t in\n Green \u{0}"), "Blue in Green");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn missing_file_yields_empty_map() {
        let dir = TempDir::new().unwrap();
        let tags = MetadataReader::new().read(&dir.path().join("missing.flac"));
        assert!(tags.is_empty());
    }

    #[test]
    fn untagged_wav_yields_empty_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        assert!(MetadataReader::default().read(&path).is_empty());
    }
}
