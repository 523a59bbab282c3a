//! # Audio Decoder Module
//!
//! The boundary between the audio file handle and the decoding capability.
//!
//! ## Overview
//!
//! A [`DecodeBackend`] opens files and hands out [`DecodeSession`]s. A session
//! knows the file's native format, frame count and tags, and delivers native
//! frames as planar `f32` chunks from any seek position. Conversion to the
//! caller's client format happens above this layer, in
//! [`FormatConverter`](crate::convert::FormatConverter).
//!
//! [`SymphoniaBackend`] is the default backend and supports all formats enabled
//! through the `decoder-*` features:
//!
//! | Format | Codec | Feature Flag |
//! |--------|-------|--------------|
//! | MP3 | MPEG-1/2 Audio Layer III | `decoder-mp3` |
//! | FLAC | Free Lossless Audio Codec | `decoder-flac` |
//! | Vorbis | Ogg Vorbis | `decoder-vorbis` |
//! | AAC | Advanced Audio Coding (MP4/M4A) | `decoder-aac` |
//! | WAV | PCM / ADPCM in RIFF WAVE | `decoder-wav` |
//! | ALAC | Apple Lossless (MP4/M4A) | `decoder-alac` |
//!
//! ## Architecture
//!
//! ```text
//! path → DecodeBackend::open → DecodeSession → DecodedChunk (native, planar f32)
//! ```

pub mod format_detector;
pub mod sample_converter;
pub mod symphonia;
pub mod writer;

pub use format_detector::FormatDetector;
pub use sample_converter::SampleConverter;
pub use symphonia::SymphoniaSession;
pub use writer::EmptySession;

use crate::error::Result;
use crate::format::FormatDescriptor;
use crate::metadata::MetadataReader;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// What a backend learned about a file when opening it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    /// Native format of the file
    pub format: FormatDescriptor,
    /// Total frames in the native format
    pub total_frames: u64,
    /// Tags embedded in the container
    pub metadata: HashMap<String, String>,
}

/// A run of decoded native frames.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChunk {
    /// Native frame index of the first sample in every plane
    pub start_frame: u64,
    /// One plane of samples per channel, normalized to [-1.0, 1.0]
    pub channels: Vec<Vec<f32>>,
}

impl DecodedChunk {
    /// Create a chunk starting at `start_frame`.
    pub fn new(start_frame: u64, channels: Vec<Vec<f32>>) -> Self {
        Self {
            start_frame,
            channels,
        }
    }

    /// Number of frames in the chunk.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Returns `true` if the chunk holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}

/// An open decoding session on one file.
///
/// Sessions are driven by a single owner at a time; they are `Send` so the
/// owning handle can move them to a worker thread.
pub trait DecodeSession: Send {
    /// Format, length and tags of the file.
    fn info(&self) -> SessionInfo;

    /// Position the session so the next chunk contains native frame `frame`.
    ///
    /// The next chunk may start before `frame`; callers trim using
    /// [`DecodedChunk::start_frame`]. Seeking past the end is not an error:
    /// the session simply reports end of stream.
    fn seek(&mut self, frame: u64) -> Result<()>;

    /// Decode the next chunk of native frames.
    ///
    /// Returns `Ok(None)` at end of stream.
    fn next_chunk(&mut self) -> Result<Option<DecodedChunk>>;
}

/// Opens and creates decode sessions.
pub trait DecodeBackend: Send + Sync {
    /// Open an existing file for decoding.
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSession>>;

    /// Create a new, empty file in `format` and return a session on it.
    fn create(&self, path: &Path, format: &FormatDescriptor) -> Result<Box<dyn DecodeSession>>;

    /// File extensions this backend can open.
    fn supported_extensions(&self) -> BTreeSet<String>;
}

/// Default backend backed by Symphonia (decoding), lofty (tags) and hound
/// (WAV creation).
#[derive(Debug, Clone, Default)]
pub struct SymphoniaBackend {
    metadata: MetadataReader,
}

impl SymphoniaBackend {
    /// Create the default backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecodeBackend for SymphoniaBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSession>> {
        let session = SymphoniaSession::open(path)?;
        let tags = self.metadata.read(path);
        Ok(Box::new(session.with_metadata(tags)))
    }

    fn create(&self, path: &Path, format: &FormatDescriptor) -> Result<Box<dyn DecodeSession>> {
        let session = writer::create_wav(path, format)?;
        Ok(Box::new(session))
    }

    fn supported_extensions(&self) -> BTreeSet<String> {
        FormatDetector::supported_extensions()
    }
}
