//! # Audio Format Types
//!
//! Value types describing how audio is encoded, both on disk (the *file* format)
//! and as delivered to callers (the *client* format).
//!
//! A client format must always be linear PCM. A file format may be anything the
//! decoder can read; the decoder transcodes it to the client format on every read.
//!
//! ## Usage Example
//!
//! ```rust
//! use core_audiofile::FormatDescriptor;
//!
//! // 16 kHz mono, 16-bit signed integer samples, interleaved
//! let speech = FormatDescriptor::linear_pcm(16_000.0, 1, 16, false, true);
//! assert!(speech.validate_client().is_ok());
//! assert_eq!(speech.bytes_per_frame(), 2);
//! ```

use crate::error::{AudioFileError, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Codec
// ============================================================================

/// Encoding of the samples inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// Uncompressed linear PCM (integer or float)
    Pcm,
    /// MPEG-1 Audio Layer 3
    Mp3,
    /// Advanced Audio Coding (AAC/M4A)
    Aac,
    /// Free Lossless Audio Codec
    Flac,
    /// Ogg Vorbis
    Vorbis,
    /// Apple Lossless Audio Codec
    Alac,
    /// IMA / Microsoft ADPCM
    Adpcm,
    /// Codec not recognized
    Unknown,
    /// Custom or proprietary codec
    Other(String),
}

// ============================================================================
// Format Descriptor
// ============================================================================

/// Describes a stream of audio frames.
///
/// One frame holds one sample per channel. When `is_interleaved` is `false`
/// the samples of each channel live in their own buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Sample encoding
    pub codec: AudioCodec,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Number of channels (1 = mono, 2 = stereo, ...)
    pub channel_count: u32,
    /// Bits per sample of a single channel (0 when the codec has no fixed width)
    pub bits_per_channel: u32,
    /// Samples are IEEE floats rather than signed integers
    pub is_float: bool,
    /// All channels share one buffer (LRLRLR...)
    pub is_interleaved: bool,
}

impl FormatDescriptor {
    /// Create a linear PCM descriptor.
    pub fn linear_pcm(
        sample_rate: f64,
        channel_count: u32,
        bits_per_channel: u32,
        is_float: bool,
        is_interleaved: bool,
    ) -> Self {
        Self {
            codec: AudioCodec::Pcm,
            sample_rate,
            channel_count,
            bits_per_channel,
            is_float,
            is_interleaved,
        }
    }

    /// 32-bit float, non-interleaved PCM.
    pub fn float_planar(sample_rate: f64, channel_count: u32) -> Self {
        Self::linear_pcm(sample_rate, channel_count, 32, true, false)
    }

    /// The canonical client format: stereo, non-interleaved, 32-bit float, 44.1 kHz.
    pub fn canonical() -> Self {
        Self::float_planar(44_100.0, 2)
    }

    /// Standard CD quality (44.1 kHz, 16-bit stereo, interleaved)
    pub fn cd_quality() -> Self {
        Self::linear_pcm(44_100.0, 2, 16, false, true)
    }

    /// Returns `true` for uncompressed linear PCM.
    pub fn is_linear_pcm(&self) -> bool {
        self.codec == AudioCodec::Pcm
    }

    /// Bytes used by one sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_channel as usize).div_ceil(8)
    }

    /// Bytes used by one frame within a single buffer.
    ///
    /// For interleaved formats this spans every channel; for non-interleaved
    /// formats each channel buffer holds one sample per frame.
    pub fn bytes_per_frame(&self) -> usize {
        if self.is_interleaved {
            self.bytes_per_sample() * self.channel_count as usize
        } else {
            self.bytes_per_sample()
        }
    }

    /// Number of separate buffers a read in this format produces.
    pub fn buffer_count(&self) -> usize {
        if self.is_interleaved {
            1
        } else {
            self.channel_count as usize
        }
    }

    /// Check that this descriptor can be used as a client format.
    ///
    /// # Errors
    ///
    /// Returns [`AudioFileError::InvalidClientFormat`] if the format is not
    /// linear PCM, has no channels, has a non-positive sample rate, or uses a
    /// sample width the converter cannot produce.
    pub fn validate_client(&self) -> Result<()> {
        if !self.is_linear_pcm() {
            return Err(AudioFileError::InvalidClientFormat(format!(
                "client format must be linear PCM, got {:?}",
                self.codec
            )));
        }

        if self.channel_count == 0 {
            return Err(AudioFileError::InvalidClientFormat(
                "channel_count must be >= 1".to_string(),
            ));
        }

        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(AudioFileError::InvalidClientFormat(format!(
                "sample_rate must be > 0, got {}",
                self.sample_rate
            )));
        }

        let width_ok = if self.is_float {
            matches!(self.bits_per_channel, 32 | 64)
        } else {
            matches!(self.bits_per_channel, 8 | 16 | 24 | 32)
        };

        if !width_ok {
            return Err(AudioFileError::InvalidClientFormat(format!(
                "unsupported {} sample width: {} bits",
                if self.is_float { "float" } else { "integer" },
                self.bits_per_channel
            )));
        }

        Ok(())
    }
}

impl Default for FormatDescriptor {
    fn default() -> Self {
        Self::canonical()
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// What the caller intends to do with the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePermission {
    /// Open an existing file for reading.
    #[default]
    Read,
    /// Open or create a file for writing.
    Write,
    /// Open or create a file for reading and writing.
    ReadWrite,
}

impl FilePermission {
    /// Returns `true` if the permission allows writing (and therefore creation).
    pub fn can_write(self) -> bool {
        matches!(self, FilePermission::Write | FilePermission::ReadWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_format() {
        let format = FormatDescriptor::canonical();
        assert_eq!(format.sample_rate, 44_100.0);
        assert_eq!(format.channel_count, 2);
        assert_eq!(format.bits_per_channel, 32);
        assert!(format.is_float);
        assert!(!format.is_interleaved);
        assert_eq!(format, FormatDescriptor::default());
    }

    #[test]
    fn buffer_geometry() {
        let planar = FormatDescriptor::float_planar(48_000.0, 2);
        assert_eq!(planar.bytes_per_sample(), 4);
        assert_eq!(planar.bytes_per_frame(), 4);
        assert_eq!(planar.buffer_count(), 2);

        let packed = FormatDescriptor::linear_pcm(48_000.0, 2, 24, false, true);
        assert_eq!(packed.bytes_per_sample(), 3);
        assert_eq!(packed.bytes_per_frame(), 6);
        assert_eq!(packed.buffer_count(), 1);
    }

    #[test]
    fn client_validation() {
        assert!(FormatDescriptor::canonical().validate_client().is_ok());
        assert!(FormatDescriptor::cd_quality().validate_client().is_ok());

        let mut mp3 = FormatDescriptor::canonical();
        mp3.codec = AudioCodec::Mp3;
        assert!(matches!(
            mp3.validate_client(),
            Err(AudioFileError::InvalidClientFormat(_))
        ));

        let silent = FormatDescriptor::float_planar(44_100.0, 0);
        assert!(silent.validate_client().is_err());

        let no_rate = FormatDescriptor::float_planar(0.0, 2);
        assert!(no_rate.validate_client().is_err());

        let odd_float = FormatDescriptor::linear_pcm(44_100.0, 2, 16, true, false);
        assert!(odd_float.validate_client().is_err());

        let odd_int = FormatDescriptor::linear_pcm(44_100.0, 2, 12, false, false);
        assert!(odd_int.validate_client().is_err());
    }

    #[test]
    fn permission_write_flags() {
        assert!(!FilePermission::Read.can_write());
        assert!(FilePermission::Write.can_write());
        assert!(FilePermission::ReadWrite.can_write());
        assert_eq!(FilePermission::default(), FilePermission::Read);
    }
}
