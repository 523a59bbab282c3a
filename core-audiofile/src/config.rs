//! # Audio File Configuration
//!
//! Tuning constants and deployment overrides for audio file handles.

use crate::error::{AudioFileError, Result};
use crate::format::FormatDescriptor;
use crate::waveform::ReductionStatistic;
use serde::{Deserialize, Serialize};

/// Audio file handle configuration.
///
/// Controls the default client format, the chunk size used when scanning a
/// file, and the default waveform resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFileConfig {
    /// Client format used when an open does not request one.
    ///
    /// Default: stereo, non-interleaved, 32-bit float, 44.1 kHz.
    #[serde(default = "default_client_format")]
    pub default_client_format: FormatDescriptor,

    /// Frames read per chunk while reducing a waveform.
    ///
    /// Independent of bucket size; only bounds memory per read.
    ///
    /// Default: 4096 frames (~93ms at 44.1kHz).
    #[serde(default = "default_read_chunk_frames")]
    pub read_chunk_frames: usize,

    /// Points per channel produced by `waveform_data()`.
    ///
    /// Default: 1024.
    #[serde(default = "default_waveform_points")]
    pub waveform_points: usize,

    /// Statistic computed per waveform bucket.
    ///
    /// Default: peak.
    #[serde(default)]
    pub reduction: ReductionStatistic,
}

impl Default for AudioFileConfig {
    fn default() -> Self {
        Self {
            default_client_format: default_client_format(),
            read_chunk_frames: default_read_chunk_frames(),
            waveform_points: default_waveform_points(),
            reduction: ReductionStatistic::default(),
        }
    }
}

impl AudioFileConfig {
    /// Dense waveforms for large displays.
    pub fn high_resolution() -> Self {
        Self {
            read_chunk_frames: 16_384,
            waveform_points: 4_096,
            ..Default::default()
        }
    }

    /// Small reads and coarse waveforms for constrained devices.
    pub fn low_memory() -> Self {
        Self {
            read_chunk_frames: 1_024,
            waveform_points: 256,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_frames == 0 {
            return Err(AudioFileError::InvalidConfig(
                "read_chunk_frames must be > 0".to_string(),
            ));
        }

        if self.read_chunk_frames > u32::MAX as usize {
            return Err(AudioFileError::InvalidConfig(format!(
                "read_chunk_frames must fit in u32, got {}",
                self.read_chunk_frames
            )));
        }

        self.default_client_format
            .validate_client()
            .map_err(|e| AudioFileError::InvalidConfig(format!("default_client_format: {}", e)))?;

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_client_format() -> FormatDescriptor {
    FormatDescriptor::canonical()
}

fn default_read_chunk_frames() -> usize {
    4096
}

fn default_waveform_points() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioFileConfig::default();
        assert_eq!(config.read_chunk_frames, 4096);
        assert_eq!(config.waveform_points, 1024);
        assert_eq!(config.reduction, ReductionStatistic::Peak);
        assert_eq!(config.default_client_format, FormatDescriptor::canonical());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dense = AudioFileConfig::high_resolution();
        assert!(dense.waveform_points > AudioFileConfig::default().waveform_points);
        assert!(dense.validate().is_ok());

        let small = AudioFileConfig::low_memory();
        assert!(small.read_chunk_frames < AudioFileConfig::default().read_chunk_frames);
        assert!(small.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AudioFileConfig::default();
        config.read_chunk_frames = 0;
        assert!(matches!(config.validate(), Err(AudioFileError::InvalidConfig(_))));

        let mut config = AudioFileConfig::default();
        config.default_client_format.bits_per_channel = 12;
        assert!(matches!(config.validate(), Err(AudioFileError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AudioFileConfig =
            serde_json::from_str(r#"{ "waveform_points": 200, "reduction": "rms" }"#).unwrap();
        assert_eq!(config.waveform_points, 200);
        assert_eq!(config.reduction, ReductionStatistic::Rms);
        assert_eq!(config.read_chunk_frames, 4096);
        assert_eq!(config.default_client_format, FormatDescriptor::canonical());
    }
}
