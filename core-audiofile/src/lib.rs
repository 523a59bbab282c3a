//! # Audio File Module
//!
//! Opens audio files, reads their frames in a caller-chosen PCM format and
//! reduces them to waveform summaries.
//!
//! ## Overview
//!
//! This module handles:
//! - Decoding any container/codec enabled through the `decoder-*` features
//! - Conversion to a client format (sample rate, channel layout, sample type)
//! - A frame cursor with read and position notifications
//! - Waveform reduction, synchronously or off the calling thread
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use core_audiofile::AudioFile;
//!
//! # fn main() -> core_audiofile::Result<()> {
//! let mut file = AudioFile::open("drums.wav")?;
//! println!("{:?}, {} frames", file.file_format(), file.total_frames());
//!
//! let read = file.read_frames(1024)?;
//! println!("read {} frames", read.frames_read);
//!
//! file.waveform_data_async(|summary| {
//!     println!("{} points per channel", summary.points_per_channel);
//! });
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod convert;
pub mod decoder;
pub mod error;
pub mod file;
pub mod format;
pub mod metadata;
pub mod notifier;
pub mod runner;
pub mod waveform;

pub use buffer::PcmBuffer;
pub use config::AudioFileConfig;
pub use decoder::{DecodeBackend, DecodeSession, DecodedChunk, SessionInfo, SymphoniaBackend};
pub use error::{AudioFileError, Result};
pub use file::{AudioFile, OpenOptions, ReadResult};
pub use format::{AudioCodec, FilePermission, FormatDescriptor};
pub use metadata::MetadataReader;
pub use notifier::AudioFileObserver;
pub use runner::TaskRunner;
pub use waveform::{ReductionStatistic, WaveformReducer, WaveformSummary};

use std::collections::BTreeSet;

/// File extensions the default backend can open.
pub fn supported_file_types() -> BTreeSet<String> {
    decoder::FormatDetector::supported_extensions()
}

/// Client format used when an open does not request one.
pub fn default_client_format() -> FormatDescriptor {
    AudioFileConfig::default().default_client_format
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_format_is_canonical() {
        let format = default_client_format();
        assert_eq!(format.channel_count, 2);
        assert_eq!(format.sample_rate, 44_100.0);
        assert!(format.is_float);
        assert!(!format.is_interleaved);
    }

    #[cfg(feature = "decoder-wav")]
    #[test]
    fn wav_is_supported() {
        assert!(supported_file_types().contains("wav"));
    }
}
