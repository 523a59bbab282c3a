//! # Format Detection Module
//!
//! Probe hints, codec classification and the supported-file-type table.

use crate::error::{AudioFileError, Result};
use crate::format::AudioCodec;
use std::collections::BTreeSet;
use std::path::Path;
use symphonia::core::codecs::CodecType;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Format detector for audio files.
///
/// Generates hints for Symphonia's probe system and maps Symphonia codec types
/// onto [`AudioCodec`].
pub struct FormatDetector;

impl FormatDetector {
    /// Create a probe hint from file path.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_audiofile::decoder::FormatDetector;
    /// use std::path::Path;
    ///
    /// let hint = FormatDetector::hint_from_path(Path::new("/music/song.flac"));
    /// // Hint will contain extension "flac"
    /// ```
    pub fn hint_from_path(path: &Path) -> Hint {
        let mut hint = Hint::new();

        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            debug!("Setting probe hint extension: {}", extension);
            hint.with_extension(extension);
        } else {
            debug!("No file extension found, probe will auto-detect");
        }

        hint
    }

    /// Detect audio codec from Symphonia codec type.
    pub fn detect_codec(codec_type: CodecType) -> AudioCodec {
        use symphonia::core::codecs::*;

        if codec_type == CODEC_TYPE_MP3 {
            AudioCodec::Mp3
        } else if codec_type == CODEC_TYPE_AAC {
            AudioCodec::Aac
        } else if codec_type == CODEC_TYPE_FLAC {
            AudioCodec::Flac
        } else if codec_type == CODEC_TYPE_VORBIS {
            AudioCodec::Vorbis
        } else if codec_type == CODEC_TYPE_ALAC {
            AudioCodec::Alac
        } else if codec_type == CODEC_TYPE_ADPCM_IMA_WAV || codec_type == CODEC_TYPE_ADPCM_MS {
            AudioCodec::Adpcm
        } else if Self::is_pcm(codec_type) {
            AudioCodec::Pcm
        } else {
            warn!("Unknown codec type: {:?}", codec_type);
            AudioCodec::Unknown
        }
    }

    /// Returns `true` if the Symphonia codec type is uncompressed linear PCM.
    pub fn is_pcm(codec_type: CodecType) -> bool {
        use symphonia::core::codecs::*;

        [
            CODEC_TYPE_PCM_S8,
            CODEC_TYPE_PCM_U8,
            CODEC_TYPE_PCM_S16LE,
            CODEC_TYPE_PCM_S16BE,
            CODEC_TYPE_PCM_S24LE,
            CODEC_TYPE_PCM_S24BE,
            CODEC_TYPE_PCM_S32LE,
            CODEC_TYPE_PCM_S32BE,
            CODEC_TYPE_PCM_F32LE,
            CODEC_TYPE_PCM_F32BE,
            CODEC_TYPE_PCM_F64LE,
            CODEC_TYPE_PCM_F64BE,
        ]
        .contains(&codec_type)
    }

    /// Returns `true` if the Symphonia codec type carries float samples.
    pub fn is_float_pcm(codec_type: CodecType) -> bool {
        use symphonia::core::codecs::*;

        [
            CODEC_TYPE_PCM_F32LE,
            CODEC_TYPE_PCM_F32BE,
            CODEC_TYPE_PCM_F64LE,
            CODEC_TYPE_PCM_F64BE,
        ]
        .contains(&codec_type)
    }

    /// Validate if a codec is supported by current feature flags.
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Codec is supported
    /// - `Err(AudioFileError::UnsupportedFormat)` - Codec not enabled
    pub fn validate_codec_support(codec: &AudioCodec) -> Result<()> {
        match codec {
            AudioCodec::Mp3 => {
                #[cfg(not(feature = "decoder-mp3"))]
                return Err(AudioFileError::UnsupportedFormat(
                    "MP3 decoder not enabled. Enable 'decoder-mp3' feature".to_string(),
                ));
                #[cfg(feature = "decoder-mp3")]
                Ok(())
            }
            AudioCodec::Flac => {
                #[cfg(not(feature = "decoder-flac"))]
                return Err(AudioFileError::UnsupportedFormat(
                    "FLAC decoder not enabled. Enable 'decoder-flac' feature".to_string(),
                ));
                #[cfg(feature = "decoder-flac")]
                Ok(())
            }
            AudioCodec::Vorbis => {
                #[cfg(not(feature = "decoder-vorbis"))]
                return Err(AudioFileError::UnsupportedFormat(
                    "Vorbis decoder not enabled. Enable 'decoder-vorbis' feature".to_string(),
                ));
                #[cfg(feature = "decoder-vorbis")]
                Ok(())
            }
            AudioCodec::Aac => {
                #[cfg(not(feature = "decoder-aac"))]
                return Err(AudioFileError::UnsupportedFormat(
                    "AAC decoder not enabled. Enable 'decoder-aac' feature".to_string(),
                ));
                #[cfg(feature = "decoder-aac")]
                Ok(())
            }
            AudioCodec::Pcm | AudioCodec::Adpcm => {
                #[cfg(not(feature = "decoder-wav"))]
                return Err(AudioFileError::UnsupportedFormat(
                    "WAV decoder not enabled. Enable 'decoder-wav' feature".to_string(),
                ));
                #[cfg(feature = "decoder-wav")]
                Ok(())
            }
            AudioCodec::Alac => {
                #[cfg(not(feature = "decoder-alac"))]
                return Err(AudioFileError::UnsupportedFormat(
                    "ALAC decoder not enabled. Enable 'decoder-alac' feature".to_string(),
                ));
                #[cfg(feature = "decoder-alac")]
                Ok(())
            }
            AudioCodec::Unknown => Err(AudioFileError::UnsupportedFormat(
                "Unknown audio codec".to_string(),
            )),
            AudioCodec::Other(name) => Err(AudioFileError::UnsupportedFormat(format!(
                "Unsupported codec: {}",
                name
            ))),
        }
    }

    /// File extensions that can be opened with the enabled decoders.
    pub fn supported_extensions() -> BTreeSet<String> {
        let mut extensions: Vec<&str> = Vec::new();

        #[cfg(feature = "decoder-wav")]
        extensions.extend(["wav", "wave"]);
        #[cfg(feature = "decoder-mp3")]
        extensions.push("mp3");
        #[cfg(feature = "decoder-flac")]
        extensions.push("flac");
        #[cfg(feature = "decoder-vorbis")]
        extensions.extend(["ogg", "oga"]);
        #[cfg(feature = "decoder-aac")]
        extensions.extend(["aac", "m4a", "mp4"]);
        #[cfg(feature = "decoder-alac")]
        extensions.extend(["m4a", "mp4"]);

        extensions.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::codecs::{CODEC_TYPE_FLAC, CODEC_TYPE_NULL, CODEC_TYPE_PCM_F32LE, CODEC_TYPE_PCM_S16LE};

    #[test]
    fn test_hint_from_path() {
        let path = Path::new("/music/song.mp3");
        let _hint = FormatDetector::hint_from_path(path);
        // Hint is opaque, but should not panic
        let _hint = FormatDetector::hint_from_path(Path::new("/music/no_extension"));
    }

    #[test]
    fn test_detect_codec() {
        assert_eq!(FormatDetector::detect_codec(CODEC_TYPE_FLAC), AudioCodec::Flac);
        assert_eq!(FormatDetector::detect_codec(CODEC_TYPE_PCM_S16LE), AudioCodec::Pcm);
        assert_eq!(FormatDetector::detect_codec(CODEC_TYPE_NULL), AudioCodec::Unknown);
        assert!(FormatDetector::is_float_pcm(CODEC_TYPE_PCM_F32LE));
        assert!(!FormatDetector::is_float_pcm(CODEC_TYPE_PCM_S16LE));
    }

    #[test]
    fn test_codec_validation() {
        // Outcomes for real codecs depend on feature flags
        let _ = FormatDetector::validate_codec_support(&AudioCodec::Mp3);
        let _ = FormatDetector::validate_codec_support(&AudioCodec::Flac);

        // Unknown codecs should always fail
        assert!(FormatDetector::validate_codec_support(&AudioCodec::Unknown).is_err());
        assert!(
            FormatDetector::validate_codec_support(&AudioCodec::Other("custom".to_string()))
                .is_err()
        );
    }

    #[cfg(feature = "decoder-all")]
    #[test]
    fn test_supported_extensions_deduplicated() {
        let extensions = FormatDetector::supported_extensions();
        for ext in ["wav", "mp3", "flac", "ogg", "m4a"] {
            assert!(extensions.contains(ext), "missing {ext}");
        }
        assert_eq!(extensions.iter().filter(|e| e.as_str() == "m4a").count(), 1);
    }
}
